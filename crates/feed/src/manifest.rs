//! 해시 매니페스트 (`sha256sums`)
//!
//! 한 줄에 하나씩 `<hex sha256>  <상대 경로>` 형식입니다.
//! `sha256sum` 출력과 호환되도록 바이너리 모드 표시(`*`)도 허용합니다.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::verifier::Verdict;

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "sha256sums";

/// 매니페스트 서명 파일 이름
pub const SIGNATURE_FILE: &str = "sha256sums.sig";

/// 파싱된 매니페스트
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// 매니페스트 텍스트를 파싱합니다.
    ///
    /// 빈 줄과 `#` 주석은 무시합니다. 형식이 잘못된 줄이 있으면 줄 번호와 함께 에러를 반환합니다.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (digest, path) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("line {}: missing path", lineno + 1))?;
            let path = path.trim_start().trim_start_matches('*');
            if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("line {}: invalid sha256 digest", lineno + 1));
            }
            if path.is_empty() {
                return Err(format!("line {}: missing path", lineno + 1));
            }
            entries.insert(path.to_owned(), digest.to_ascii_lowercase());
        }
        Ok(Self { entries })
    }

    /// 상대 경로의 기대 해시
    pub fn expected(&self, relative: &str) -> Option<&str> {
        self.entries.get(relative).map(String::as_str)
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 파일 내용이 매니페스트의 해시와 일치하는지 확인합니다.
    pub fn check(&self, relative: &str, content: &[u8]) -> Verdict {
        let Some(expected) = self.expected(relative) else {
            return Verdict::Untrusted(format!("{relative} is not listed in the manifest"));
        };
        let actual = sha256_hex(content);
        if actual == expected {
            Verdict::Trusted
        } else {
            Verdict::Untrusted(format!(
                "hash mismatch for {relative}: expected {expected}, got {actual}"
            ))
        }
    }
}

/// SHA-256 해시의 소문자 hex 문자열
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
