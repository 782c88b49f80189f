pub mod broker;
pub mod cache;
pub mod db;
pub mod storage;
