use crate::err::PipeErr;
use crate::pipe::Pipeline;
use crate::PipeRes;
use std::mem;

/// 逐个追加元素、最终冻结为一条新流水线的构建器。
///
/// `build`之后构建器即被冻结，再次`append`或`build`都会失败。
pub struct PipeBuilder<T> {
    values: Vec<T>,
    built: bool,
}

impl<T: 'static> PipeBuilder<T> {
    pub(crate) fn new() -> PipeBuilder<T> {
        PipeBuilder { values: Vec::new(), built: false }
    }

    /// 追加一个元素，保持追加顺序，支持链式调用。
    pub fn append(&mut self, value: T) -> PipeRes<&mut Self> {
        if self.built {
            return Err(PipeErr::BuilderBuiltErr);
        }
        self.values.push(value);
        Ok(self)
    }

    /// 冻结已追加的元素，按追加顺序生成一条未消费的流水线。
    pub fn build(&mut self) -> PipeRes<Pipeline<T>> {
        if self.built {
            return Err(PipeErr::BuilderBuiltErr);
        }
        self.built = true;
        Ok(Pipeline::from(mem::take(&mut self.values)))
    }
}

impl<T: 'static> Default for PipeBuilder<T> {
    fn default() -> Self {
        PipeBuilder::new()
    }
}
