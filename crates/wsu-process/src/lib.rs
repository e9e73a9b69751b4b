mod command;
mod palette;
mod result;
mod sink;
mod supervisor;

pub use command::CommandSpec;
pub use palette::Palette;
pub use result::CommandResult;
pub use sink::{ConsoleSink, LineSink, Stream};
pub use supervisor::{ShutdownSignal, Supervisor};
