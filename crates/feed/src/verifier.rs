//! 무결성 검증
//!
//! [`verify`]는 매니페스트 바이트와 분리 서명을 신뢰 키로 검증하는 순수 함수입니다.
//! 피드 파일을 읽거나 수정하지 않습니다.
//!
//! [`IntegrityPolicy`]는 검증 결과를 어떻게 적용할지 결정합니다.
//! 기본값은 fail-closed이며, fail-open은 운영자가 명시적으로 켜야 하고
//! 모든 우회가 `warn` 로그와 메트릭으로 남습니다.

use std::fmt;

use ed25519_dalek::{Signature, Verifier};
use tracing::warn;

use ironscan_core::metrics as m;

use crate::keys::TrustedKeys;

/// 검증 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 신뢰 가능
    Trusted,
    /// 신뢰 불가 (사유 포함)
    Untrusted(String),
}

impl Verdict {
    /// 신뢰 가능한지 확인합니다.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted => write!(f, "trusted"),
            Self::Untrusted(reason) => write!(f, "untrusted: {reason}"),
        }
    }
}

/// 분리 서명을 검증합니다.
///
/// `signature`는 hex로 인코딩된 64바이트 Ed25519 서명입니다.
/// 서명이 없거나, 형식이 잘못되었거나, 어떤 신뢰 키로도 검증되지 않으면 `Untrusted`입니다.
pub fn verify(manifest: &[u8], signature: Option<&str>, keys: &TrustedKeys) -> Verdict {
    let Some(signature) = signature else {
        return Verdict::Untrusted("missing signature".to_owned());
    };

    let raw = match hex::decode(signature.trim()) {
        Ok(raw) => raw,
        Err(e) => return Verdict::Untrusted(format!("malformed signature: {e}")),
    };
    let signature = match Signature::from_slice(&raw) {
        Ok(sig) => sig,
        Err(e) => return Verdict::Untrusted(format!("malformed signature: {e}")),
    };

    if keys.is_empty() {
        return Verdict::Untrusted("no trusted keys configured".to_owned());
    }

    if keys
        .iter()
        .any(|(_, key)| key.verify(manifest, &signature).is_ok())
    {
        Verdict::Trusted
    } else {
        Verdict::Untrusted("signature does not match any trusted key".to_owned())
    }
}

/// 검증 실패 처리 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// 신뢰할 수 없는 콘텐츠 거부 (기본)
    #[default]
    FailClosed,
    /// 신뢰할 수 없는 콘텐츠를 경고와 함께 허용
    FailOpen,
}

/// 정책 적용 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 검증 통과
    Accept,
    /// 검증 실패, fail-open으로 허용
    Bypass,
    /// 검증 실패, 거부
    Reject,
}

impl IntegrityPolicy {
    /// `disable_integrity_check` 설정값으로 정책을 결정합니다.
    pub fn from_disable_flag(disabled: bool) -> Self {
        if disabled { Self::FailOpen } else { Self::FailClosed }
    }

    /// 정책 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailClosed => "fail-closed",
            Self::FailOpen => "fail-open",
        }
    }

    /// 검증 결과에 정책을 적용합니다.
    ///
    /// 우회와 거부 모두 대상 경로와 사유를 `warn`으로 기록합니다.
    pub fn admit(&self, subject: &str, verdict: &Verdict) -> Admission {
        match (verdict, self) {
            (Verdict::Trusted, _) => Admission::Accept,
            (Verdict::Untrusted(reason), Self::FailOpen) => {
                warn!(
                    subject,
                    reason = %reason,
                    "integrity check failed, loading anyway because verification is disabled"
                );
                metrics::counter!(m::FEED_INTEGRITY_BYPASS_TOTAL).increment(1);
                Admission::Bypass
            }
            (Verdict::Untrusted(reason), Self::FailClosed) => {
                warn!(subject, reason = %reason, "ignoring feed content due to invalid signature");
                metrics::counter!(m::FEED_FILES_REJECTED_TOTAL).increment(1);
                Admission::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keyring(seed: u8) -> (SigningKey, TrustedKeys) {
        let signing = SigningKey::from_bytes(&[seed; 32]);
        let keys = TrustedKeys::from_keys([("test".to_owned(), signing.verifying_key())]);
        (signing, keys)
    }

    #[test]
    fn valid_signature_is_trusted() {
        let (signing, keys) = keyring(7);
        let manifest = b"abc  a.notus\n";
        let sig = hex::encode(signing.sign(manifest).to_bytes());
        assert_eq!(verify(manifest, Some(&sig), &keys), Verdict::Trusted);
    }

    #[test]
    fn missing_signature_is_untrusted() {
        let (_, keys) = keyring(7);
        let verdict = verify(b"x", None, &keys);
        assert_eq!(verdict, Verdict::Untrusted("missing signature".to_owned()));
    }

    #[test]
    fn tampered_manifest_is_untrusted() {
        let (signing, keys) = keyring(7);
        let sig = hex::encode(signing.sign(b"original").to_bytes());
        assert!(!verify(b"tampered", Some(&sig), &keys).is_trusted());
    }

    #[test]
    fn unknown_signer_is_untrusted() {
        let (_, keys) = keyring(7);
        let (other, _) = keyring(9);
        let sig = hex::encode(other.sign(b"m").to_bytes());
        let verdict = verify(b"m", Some(&sig), &keys);
        assert!(verdict.to_string().contains("any trusted key"));
    }

    #[test]
    fn malformed_signature_is_untrusted() {
        let (_, keys) = keyring(7);
        assert!(!verify(b"m", Some("zz"), &keys).is_trusted());
        assert!(!verify(b"m", Some("abcd"), &keys).is_trusted());
    }

    #[test]
    fn empty_keyring_trusts_nothing() {
        let (signing, _) = keyring(7);
        let sig = hex::encode(signing.sign(b"m").to_bytes());
        assert!(!verify(b"m", Some(&sig), &TrustedKeys::default()).is_trusted());
    }

    #[test]
    fn policy_admission() {
        let bad = Verdict::Untrusted("hash mismatch".to_owned());
        assert_eq!(IntegrityPolicy::FailClosed.admit("a", &Verdict::Trusted), Admission::Accept);
        assert_eq!(IntegrityPolicy::FailClosed.admit("a", &bad), Admission::Reject);
        assert_eq!(IntegrityPolicy::FailOpen.admit("a", &bad), Admission::Bypass);
    }

    #[test]
    fn policy_defaults_to_fail_closed() {
        assert_eq!(IntegrityPolicy::default(), IntegrityPolicy::FailClosed);
        assert_eq!(IntegrityPolicy::from_disable_flag(false), IntegrityPolicy::FailClosed);
        assert_eq!(IntegrityPolicy::from_disable_flag(true), IntegrityPolicy::FailOpen);
        assert_eq!(IntegrityPolicy::FailOpen.as_str(), "fail-open");
    }
}
