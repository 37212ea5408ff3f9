//! Redis 상태 저장소
//!
//! `ConnectionManager`로 연결이 끊기면 자동 재연결합니다.
//! 상태 전이는 Lua compare-and-set 스크립트로 수행되어
//! 여러 데몬 인스턴스가 같은 저장소를 공유해도 단조성이 유지됩니다.
//! 재시도는 이 계층에서 하지 않고 [`RetryingStore`](crate::RetryingStore)가 담당합니다.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use ironscan_core::types::{HostProgress, Scan, ScanId, ScanOptions, ScanResult, ScanStatus};

use crate::error::StoreError;
use crate::keys;
use crate::store::{ScanField, StateStore, Transition};

mod scripts {
    use redis::Script;

    /// ID 등록과 레코드 저장을 한 번에 수행합니다.
    ///
    /// KEYS[1] = 스캔 ID 집합, KEYS[2] = 스캔 해시
    /// ARGV[1] = 스캔 ID, ARGV[2..] = 필드/값 쌍
    ///
    /// 반환: 1 생성, 0 ID 사용 중
    pub fn create() -> Script {
        Script::new(
            r#"
            if redis.call('SADD', KEYS[1], ARGV[1]) == 0 then
                return 0
            end
            redis.call('HSET', KEYS[2], unpack(ARGV, 2))
            return 1
            "#,
        )
    }

    /// 상태 compare-and-set
    ///
    /// KEYS[1] = 스캔 해시
    /// ARGV[1] = 목표 상태, ARGV[2] = 시각, ARGV[3] = 시각 필드명 (없으면 ""),
    /// ARGV[4] = 에러 상세 (없으면 ""), ARGV[5..] = 허용된 이전 상태
    ///
    /// 반환: {1, 이전 상태} 성공, {0, 현재 상태} 거부, {-1, ""} 스캔 없음
    pub fn transition() -> Script {
        Script::new(
            r#"
            local cur = redis.call('HGET', KEYS[1], 'status')
            if not cur then
                return {-1, ''}
            end
            for i = 5, #ARGV do
                if ARGV[i] == cur then
                    redis.call('HSET', KEYS[1], 'status', ARGV[1], 'last_update', ARGV[2])
                    if ARGV[3] ~= '' then
                        redis.call('HSET', KEYS[1], ARGV[3], ARGV[2])
                    end
                    if ARGV[4] ~= '' then
                        redis.call('HSET', KEYS[1], 'error', ARGV[4])
                    end
                    return {1, cur}
                end
            end
            return {0, cur}
            "#,
        )
    }
}

/// Redis 상태 저장소
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStateStore {
    /// Redis에 연결합니다.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!(redis_url, "connecting to state store");
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client).await?;
        info!("state store connected");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

impl StateStore for RedisStateStore {
    async fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let targets = serde_json::to_string(&scan.targets)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let options = serde_json::to_string(&scan.options)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let fields = [
            ("targets", targets),
            ("options", options),
            ("status", scan.status.as_str().to_owned()),
            ("created_time", scan.created_time.to_string()),
            ("progress", scan.progress.to_string()),
            ("last_update", scan.last_update.to_string()),
        ];
        let script = scripts::create();
        let mut invocation = script.key(keys::scans_set());
        invocation.key(keys::scan(scan.id)).arg(scan.id.to_string());
        for (name, value) in &fields {
            invocation.arg(*name).arg(value);
        }
        let created: i64 = invocation.invoke_async(&mut conn).await?;
        if created == 0 {
            return Err(StoreError::IdCollision(scan.id));
        }
        debug!(scan_id = %scan.id, "scan record created");
        Ok(())
    }

    async fn put_field(&self, id: ScanId, field: ScanField) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let key = keys::scan(id);
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(StoreError::NotFound(id));
        }
        match field.encode() {
            Some(value) => {
                let _: () = conn.hset(&key, field.name(), value).await?;
            }
            None => {
                let _: () = conn.hdel(&key, field.name()).await?;
            }
        }
        Ok(())
    }

    async fn transition(&self, id: ScanId, transition: Transition) -> Result<ScanStatus, StoreError> {
        let mut conn = self.conn();
        let script = scripts::transition();
        let mut invocation = script.key(keys::scan(id));
        invocation
            .arg(transition.to.as_str())
            .arg(transition.at)
            .arg(transition.time_field().unwrap_or(""))
            .arg(transition.error.as_deref().unwrap_or(""));
        for prev in ScanStatus::predecessors(transition.to) {
            invocation.arg(prev.as_str());
        }

        let (outcome, current): (i64, String) = invocation.invoke_async(&mut conn).await?;
        match outcome {
            1 => parse_status(id, &current),
            0 => Err(StoreError::InvalidTransition {
                id,
                from: parse_status(id, &current)?,
                to: transition.to,
            }),
            _ => Err(StoreError::NotFound(id)),
        }
    }

    async fn put_host_progress(
        &self,
        id: ScanId,
        host: &str,
        percent: u8,
        at: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .hset(keys::hosts(id), host, percent.min(100))
            .ignore()
            .hset(keys::scan(id), "last_update", at)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn append_result(&self, id: ScanId, result: &ScanResult) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let encoded =
            serde_json::to_string(result).map_err(|e| StoreError::Backend(e.to_string()))?;
        let (len,): (usize,) = redis::pipe()
            .atomic()
            .rpush(keys::results(id), encoded)
            .hset(keys::scan(id), "last_update", result.timestamp)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> = conn.hgetall(keys::scan(id)).await?;
        if fields.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        let hosts: HashMap<String, String> = conn.hgetall(keys::hosts(id)).await?;
        decode_scan(id, &fields, &hosts)
    }

    async fn list_results(&self, id: ScanId, since: usize) -> Result<Vec<ScanResult>, StoreError> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(keys::scan(id)).await?;
        if !exists {
            return Err(StoreError::NotFound(id));
        }
        let start = isize::try_from(since).unwrap_or(isize::MAX);
        let raw: Vec<String> = conn.lrange(keys::results(id), start, -1).await?;
        raw.iter()
            .map(|item| {
                serde_json::from_str(item).map_err(|e| StoreError::Corrupt {
                    id,
                    field: "results".to_owned(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn delete(&self, id: ScanId) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::pipe()
            .atomic()
            .del(vec![keys::scan(id), keys::hosts(id), keys::results(id)])
            .ignore()
            .srem(keys::scans_set(), id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;
        debug!(scan_id = %id, "scan record deleted");
        Ok(())
    }

    async fn list_scan_ids(&self) -> Result<Vec<ScanId>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.smembers(keys::scans_set()).await?;
        Ok(members
            .iter()
            .filter_map(|m| ScanId::from_str(m).ok())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn parse_status(id: ScanId, raw: &str) -> Result<ScanStatus, StoreError> {
    raw.parse().map_err(|reason| StoreError::Corrupt {
        id,
        field: "status".to_owned(),
        reason,
    })
}

fn corrupt(id: ScanId, field: &str, reason: impl fmt::Display) -> StoreError {
    StoreError::Corrupt {
        id,
        field: field.to_owned(),
        reason: reason.to_string(),
    }
}

fn required<'a>(
    id: ScanId,
    fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, StoreError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| corrupt(id, name, "missing"))
}

fn optional_u64(
    id: ScanId,
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<Option<u64>, StoreError> {
    fields
        .get(name)
        .map(|v| v.parse::<u64>().map_err(|e| corrupt(id, name, e)))
        .transpose()
}

/// 해시 필드를 스캔 스냅샷으로 복원합니다.
pub(crate) fn decode_scan(
    id: ScanId,
    fields: &HashMap<String, String>,
    hosts: &HashMap<String, String>,
) -> Result<Scan, StoreError> {
    let targets: Vec<String> = serde_json::from_str(required(id, fields, "targets")?)
        .map_err(|e| corrupt(id, "targets", e))?;
    let options: ScanOptions = serde_json::from_str(required(id, fields, "options")?)
        .map_err(|e| corrupt(id, "options", e))?;
    let status = parse_status(id, required(id, fields, "status")?)?;
    let created_time = optional_u64(id, fields, "created_time")?.unwrap_or(0);
    let last_update = optional_u64(id, fields, "last_update")?.unwrap_or(created_time);
    let progress = fields
        .get("progress")
        .map(|v| v.parse::<u8>().map_err(|e| corrupt(id, "progress", e)))
        .transpose()?
        .unwrap_or(0);

    let mut host_progress = hosts
        .iter()
        .map(|(host, pct)| {
            pct.parse::<u8>()
                .map(|percent| HostProgress {
                    host: host.clone(),
                    percent: percent.min(100),
                })
                .map_err(|e| corrupt(id, "hosts", e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    host_progress.sort_by(|a, b| a.host.cmp(&b.host));

    Ok(Scan {
        id,
        targets,
        options,
        status,
        created_time,
        start_time: optional_u64(id, fields, "start_time")?,
        end_time: optional_u64(id, fields, "end_time")?,
        progress,
        host_progress,
        error: fields.get("error").cloned(),
        last_update,
        stalled: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_fields() -> HashMap<String, String> {
        HashMap::from([
            ("targets".to_owned(), r#"["10.0.0.1","10.0.0.2"]"#.to_owned()),
            ("options".to_owned(), r#"{"max_hosts":"5"}"#.to_owned()),
            ("status".to_owned(), "RUNNING".to_owned()),
            ("created_time".to_owned(), "100".to_owned()),
            ("start_time".to_owned(), "110".to_owned()),
            ("progress".to_owned(), "40".to_owned()),
            ("last_update".to_owned(), "120".to_owned()),
        ])
    }

    #[test]
    fn decode_full_record() {
        let id = ScanId::new();
        let hosts = HashMap::from([
            ("10.0.0.2".to_owned(), "40".to_owned()),
            ("10.0.0.1".to_owned(), "100".to_owned()),
        ]);
        let scan = decode_scan(id, &base_fields(), &hosts).unwrap();
        assert_eq!(scan.targets, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(scan.options.get("max_hosts").map(String::as_str), Some("5"));
        assert_eq!(scan.status, ScanStatus::Running);
        assert_eq!(scan.start_time, Some(110));
        assert_eq!(scan.end_time, None);
        assert_eq!(scan.host_progress[0].host, "10.0.0.1");
        assert!(scan.error.is_none());
    }

    #[test]
    fn decode_rejects_unknown_status() {
        let mut fields = base_fields();
        fields.insert("status".to_owned(), "PAUSED".to_owned());
        let err = decode_scan(ScanId::new(), &fields, &HashMap::new()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref field, .. } if field == "status"));
    }

    #[test]
    fn decode_rejects_missing_targets() {
        let mut fields = base_fields();
        fields.remove("targets");
        assert!(decode_scan(ScanId::new(), &fields, &HashMap::new()).is_err());
    }
}
