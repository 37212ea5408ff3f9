//! 피드 디렉토리 로더
//!
//! 로딩은 동기 파일 I/O이므로 비동기 컨텍스트에서는
//! [`FeedRegistry::reload`](crate::FeedRegistry::reload)처럼 `spawn_blocking`으로 감싸서 호출합니다.
//!
//! # 처리 순서
//!
//! 1. 신뢰 키 로딩 (`feed.trust_keys_dir`)
//! 2. 매니페스트(`sha256sums`) 서명 검증
//! 3. `*.notus` 파일별 해시 검증 후 정책 적용
//! 4. 통과한 파일의 어드바이저리를 [`VtIndex`]로 변환

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use ironscan_core::config::FeedConfig;
use ironscan_core::metrics as m;
use ironscan_core::types::unix_now;

use crate::advisory::{ADVISORY_EXTENSION, parse_advisories};
use crate::error::FeedError;
use crate::index::VtIndex;
use crate::keys::TrustedKeys;
use crate::manifest::{MANIFEST_FILE, Manifest, SIGNATURE_FILE, sha256_hex};
use crate::verifier::{Admission, IntegrityPolicy, Verdict, verify};

/// 어드바이저리 파일 최대 크기 (64 MB)
pub const MAX_FEED_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// 현재 피드의 신뢰 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum FeedState {
    /// 모든 콘텐츠가 검증됨
    Trusted,
    /// 일부 또는 전체 콘텐츠가 fail-open 우회로 로드됨
    Bypassed,
    /// fail-closed로 콘텐츠 거부
    Refused(String),
}

impl FeedState {
    /// 이 상태에서 스캔을 시작할 수 있는지 확인합니다.
    pub fn allows_scans(&self) -> bool {
        !matches!(self, Self::Refused(_))
    }

    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Bypassed => "bypassed",
            Self::Refused(_) => "refused",
        }
    }
}

/// 로딩 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// 로드된 파일 수
    pub files_loaded: usize,
    /// 거부되거나 건너뛴 파일 수
    pub files_rejected: usize,
    /// 우회로 로드된 파일 수
    pub files_bypassed: usize,
}

/// 한 번의 로딩 결과
///
/// 생성 후 변경되지 않으며 재로딩 시 새 스냅샷으로 교체됩니다.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// VT 인덱스
    pub index: VtIndex,
    /// 신뢰 상태
    pub state: FeedState,
    /// 로딩 통계
    pub report: LoadReport,
    /// 로딩 시각 (unix 초)
    pub loaded_at: u64,
}

impl FeedSnapshot {
    /// 아직 로드되지 않은 상태의 스냅샷
    pub fn unloaded() -> Self {
        Self::empty(FeedState::Refused("feed not loaded".to_owned()))
    }

    fn empty(state: FeedState) -> Self {
        Self {
            index: VtIndex::default(),
            state,
            report: LoadReport::default(),
            loaded_at: unix_now(),
        }
    }
}

/// 피드 로더
#[derive(Debug, Clone)]
pub struct FeedLoader {
    feed_dir: PathBuf,
    trust_keys_dir: PathBuf,
    policy: IntegrityPolicy,
}

impl FeedLoader {
    /// 새 로더를 생성합니다.
    pub fn new(
        feed_dir: impl Into<PathBuf>,
        trust_keys_dir: impl Into<PathBuf>,
        policy: IntegrityPolicy,
    ) -> Self {
        Self {
            feed_dir: feed_dir.into(),
            trust_keys_dir: trust_keys_dir.into(),
            policy,
        }
    }

    /// 설정으로부터 로더를 생성합니다.
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            &config.feed_dir,
            &config.trust_keys_dir,
            IntegrityPolicy::from_disable_flag(config.disable_integrity_check),
        )
    }

    /// 적용 중인 정책
    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    /// 피드 디렉토리
    pub fn feed_dir(&self) -> &Path {
        &self.feed_dir
    }

    /// 피드를 읽고 검증합니다 (동기 I/O).
    ///
    /// 검증 실패는 에러가 아니라 스냅샷의 [`FeedState`]로 표현됩니다.
    /// 디렉토리를 나열할 수 없는 경우에만 에러를 반환합니다.
    pub fn load(&self) -> Result<FeedSnapshot, FeedError> {
        let dir_display = self.feed_dir.display().to_string();

        if !self.feed_dir.exists() {
            let verdict = Verdict::Untrusted(format!("feed directory {dir_display} not found"));
            return Ok(match self.policy.admit(&dir_display, &verdict) {
                Admission::Bypass => FeedSnapshot::empty(FeedState::Bypassed),
                _ => FeedSnapshot::empty(FeedState::Refused(verdict.to_string())),
            });
        }

        let keys = match TrustedKeys::load_dir(&self.trust_keys_dir) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to load trusted keys, no signature will verify");
                TrustedKeys::default()
            }
        };

        let (manifest, manifest_verdict) = self.read_manifest(&keys);
        let manifest_path = self.feed_dir.join(MANIFEST_FILE).display().to_string();
        if !manifest_verdict.is_trusted()
            && self.policy.admit(&manifest_path, &manifest_verdict) == Admission::Reject
        {
            return Ok(FeedSnapshot::empty(FeedState::Refused(manifest_verdict.to_string())));
        }

        let files = discover_advisory_files(&self.feed_dir)?;
        let mut report = LoadReport::default();
        let mut descriptors = Vec::new();

        for path in files {
            let relative = path
                .strip_prefix(&self.feed_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();

            let content = match read_bounded(&path) {
                Ok(content) => content,
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "skipping feed file");
                    metrics::counter!(m::FEED_FILES_REJECTED_TOTAL).increment(1);
                    report.files_rejected += 1;
                    continue;
                }
            };

            let verdict = match (&manifest_verdict, &manifest) {
                (Verdict::Trusted, Some(manifest)) => manifest.check(&relative, &content),
                (Verdict::Untrusted(reason), _) => Verdict::Untrusted(format!("manifest {reason}")),
                (Verdict::Trusted, None) => Verdict::Untrusted("manifest unavailable".to_owned()),
            };

            let admission = self.policy.admit(&path.display().to_string(), &verdict);
            if admission == Admission::Reject {
                report.files_rejected += 1;
                continue;
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match parse_advisories(&content, &filename, &stem, &sha256_hex(&content)) {
                Ok(vts) => {
                    debug!(path = %path.display(), vts = vts.len(), "loaded advisory file");
                    descriptors.extend(vts);
                    report.files_loaded += 1;
                    if admission == Admission::Bypass {
                        report.files_bypassed += 1;
                    }
                }
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "skipping unparseable advisory file");
                    metrics::counter!(m::FEED_FILES_REJECTED_TOTAL).increment(1);
                    report.files_rejected += 1;
                }
            }
        }

        let index = VtIndex::from_descriptors(descriptors);
        let state = if manifest_verdict.is_trusted() && report.files_bypassed == 0 {
            FeedState::Trusted
        } else {
            FeedState::Bypassed
        };

        metrics::gauge!(m::FEED_VTS_LOADED).set(index.len() as f64);
        info!(
            feed_dir = %dir_display,
            vts = index.len(),
            loaded = report.files_loaded,
            rejected = report.files_rejected,
            bypassed = report.files_bypassed,
            state = state.as_str(),
            policy = self.policy.as_str(),
            "feed loaded"
        );

        Ok(FeedSnapshot {
            index,
            state,
            report,
            loaded_at: unix_now(),
        })
    }

    fn read_manifest(&self, keys: &TrustedKeys) -> (Option<Manifest>, Verdict) {
        let raw = match std::fs::read(self.feed_dir.join(MANIFEST_FILE)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (None, Verdict::Untrusted("manifest not found".to_owned()));
            }
            Err(e) => return (None, Verdict::Untrusted(format!("manifest unreadable: {e}"))),
        };

        let signature = match std::fs::read_to_string(self.feed_dir.join(SIGNATURE_FILE)) {
            Ok(sig) => Some(sig),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, "failed to read manifest signature");
                None
            }
        };

        let verdict = verify(&raw, signature.as_deref(), keys);
        if !verdict.is_trusted() {
            return (None, verdict);
        }

        let parsed = std::str::from_utf8(&raw)
            .map_err(|e| e.to_string())
            .and_then(Manifest::parse);
        match parsed {
            Ok(manifest) => (Some(manifest), Verdict::Trusted),
            Err(reason) => (None, Verdict::Untrusted(format!("malformed manifest: {reason}"))),
        }
    }
}

/// 피드 디렉토리에서 `*.notus` 파일을 이름 순으로 찾습니다.
fn discover_advisory_files(dir: &Path) -> Result<Vec<PathBuf>, FeedError> {
    let entries = std::fs::read_dir(dir).map_err(|e| FeedError::Io {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "failed to read feed directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == ADVISORY_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_bounded(path: &Path) -> Result<Vec<u8>, String> {
    let metadata = std::fs::metadata(path).map_err(|e| e.to_string())?;
    if metadata.len() > MAX_FEED_FILE_SIZE {
        return Err(format!(
            "file size {} bytes exceeds maximum {} bytes",
            metadata.len(),
            MAX_FEED_FILE_SIZE
        ));
    }
    std::fs::read(path).map_err(|e| e.to_string())
}
