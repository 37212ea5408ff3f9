//! Ironscan VT 피드 무결성 검증 및 로더
//!
//! 스캔 엔진이 사용하는 어드바이저리 피드를 신뢰 키로 검증한 뒤에만 로드합니다.
//!
//! # 구성
//!
//! - [`verify`]: 매니페스트 분리 서명 검증 (부작용 없음)
//! - [`IntegrityPolicy`]: fail-closed(기본) / fail-open 정책
//! - [`FeedLoader`]: `sha256sums` + `*.notus` 파일 로딩
//! - [`VtIndex`]: OID/패밀리 조회
//! - [`FeedRegistry`]: 현재 스냅샷 보관 및 재로딩
//!
//! # 피드 디렉토리 구조
//!
//! ```text
//! advisories/
//! ├── sha256sums        # "<sha256>  <file>" 목록
//! ├── sha256sums.sig    # 매니페스트의 Ed25519 서명 (hex)
//! ├── debian_10.notus
//! └── alpine_3.notus
//! ```

pub mod advisory;
pub mod error;
pub mod index;
pub mod keys;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod verifier;

pub use error::FeedError;
pub use index::VtIndex;
pub use keys::TrustedKeys;
pub use loader::{FeedLoader, FeedSnapshot, FeedState, LoadReport};
pub use manifest::Manifest;
pub use registry::FeedRegistry;
pub use verifier::{Admission, IntegrityPolicy, Verdict, verify};
