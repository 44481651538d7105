pub mod catalog;
pub mod file;
pub mod traits;

pub use catalog::PublishGateway;
pub use file::JsonLinesDestination;
pub use traits::Destination;
