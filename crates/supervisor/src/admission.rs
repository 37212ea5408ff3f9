//! 동시 실행 수 제어
//!
//! 상한을 넘는 요청은 실패하지 않고 대기열에서 기다립니다.
//! 대기 순서는 요청 순서(FIFO)를 따릅니다.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::SupervisorError;

/// 동시 실행 스캔 수를 제한하는 게이트
///
/// 상한은 생성 시 한 번 정해지며 런타임에 바뀌지 않습니다.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    ceiling: usize,
}

/// 실행 슬롯
///
/// 드롭되면 슬롯이 반환됩니다.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// 새 게이트를 생성합니다.
    pub fn new(ceiling: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    /// 동시 실행 상한
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// 사용 중인 슬롯 수
    pub fn in_use(&self) -> usize {
        self.ceiling.saturating_sub(self.semaphore.available_permits())
    }

    /// 즉시 슬롯을 얻으려 시도합니다.
    ///
    /// 상한에 도달했으면 `Ok(None)`, 상한이 0이면 에러를 반환합니다.
    pub fn try_acquire(&self) -> Result<Option<Slot>, SupervisorError> {
        self.ensure_reachable()?;
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(Slot { _permit: permit })),
            Err(_) => Ok(None),
        }
    }

    /// 슬롯이 빌 때까지 기다립니다.
    pub async fn acquire(&self) -> Result<Slot, SupervisorError> {
        self.ensure_reachable()?;
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map(|permit| Slot { _permit: permit })
            .map_err(|_| SupervisorError::Gone)
    }

    fn ensure_reachable(&self) -> Result<(), SupervisorError> {
        if self.ceiling == 0 {
            return Err(SupervisorError::CeilingUnreachable(self.ceiling));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn try_acquire_respects_ceiling() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_acquire().unwrap();
        let b = gate.try_acquire().unwrap();
        let c = gate.try_acquire().unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(gate.in_use(), 2);

        drop(a);
        assert_eq!(gate.in_use(), 1);
        assert!(gate.try_acquire().unwrap().is_some());
    }

    #[test]
    fn zero_ceiling_is_unreachable() {
        let gate = AdmissionGate::new(0);
        assert!(matches!(
            gate.try_acquire(),
            Err(SupervisorError::CeilingUnreachable(0))
        ));
    }

    #[tokio::test]
    async fn waiter_is_admitted_when_slot_frees() {
        let gate = AdmissionGate::new(1);
        let held = gate.try_acquire().unwrap().unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter admitted")
            .unwrap()
            .unwrap();
    }
}
