mod budget;
mod money;
mod period;
mod transaction;
mod user;

pub use budget::*;
pub use money::*;
pub use period::*;
pub use transaction::*;
pub use user::*;
