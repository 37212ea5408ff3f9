//! 신뢰 키 로딩
//!
//! 신뢰 키 디렉토리의 `*.pub` 파일은 각각 32바이트 Ed25519 공개키의 hex 표현입니다.

use std::path::Path;

use ed25519_dalek::VerifyingKey;
use tracing::{debug, warn};

use crate::error::FeedError;

/// 신뢰 키 목록
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys {
    keys: Vec<(String, VerifyingKey)>,
}

impl TrustedKeys {
    /// 키 목록으로 생성합니다.
    pub fn from_keys(keys: impl IntoIterator<Item = (String, VerifyingKey)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// 디렉토리에서 `*.pub` 키를 읽습니다 (동기 I/O).
    ///
    /// 디렉토리가 없으면 빈 목록을 반환합니다. 빈 목록으로는 어떤 서명도 검증되지 않습니다.
    pub fn load_dir(dir: &Path) -> Result<Self, FeedError> {
        if !dir.exists() {
            warn!(dir = %dir.display(), "trusted key directory does not exist");
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| FeedError::Io {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "pub"))
            .collect();
        paths.sort();

        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = std::fs::read_to_string(&path).map_err(|e| FeedError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let key = parse_key(raw.trim()).map_err(|reason| FeedError::Key {
                path: path.display().to_string(),
                reason,
            })?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(key = %name, "loaded trusted key");
            keys.push((name, key));
        }

        Ok(Self { keys })
    }

    /// 키 개수
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 이름과 키 순회
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VerifyingKey)> {
        self.keys.iter().map(|(name, key)| (name.as_str(), key))
    }
}

fn parse_key(hex_str: &str) -> Result<VerifyingKey, String> {
    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex: {e}"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("expected 32 bytes, got {}", v.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| format!("invalid ed25519 key: {e}"))
}
