pub mod firebase;
pub mod storage;
