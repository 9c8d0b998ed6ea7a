mod db;
mod storage;
pub mod utils;

pub use utils::test_utils;
