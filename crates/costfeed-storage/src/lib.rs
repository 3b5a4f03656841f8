//! # costfeed-storage
//!
//! 웨어하우스 포트 어댑터.
//! 로컬 SQLite 파일(또는 인메모리 DB)에서 텔레메트리 뷰를 정의하고 조회한다.

pub mod sqlite;
