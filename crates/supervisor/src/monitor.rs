//! 스캐너 프로세스 리소스 모니터

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use ironscan_core::config::SupervisorConfig;

/// 리소스 한도
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    /// 최대 상주 메모리 (바이트, `None`이면 제한 없음)
    pub max_memory_bytes: Option<u64>,
    /// 최대 CPU 사용률 (%)
    pub max_cpu_percent: f32,
    /// CPU 한도 초과로 판정하기까지의 연속 샘플 수
    pub cpu_violation_samples: u32,
}

impl ResourceLimits {
    /// 설정으로부터 생성합니다.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            max_memory_bytes: (config.max_memory_mb > 0)
                .then(|| config.max_memory_mb.saturating_mul(1024 * 1024)),
            max_cpu_percent: config.max_cpu_percent,
            cpu_violation_samples: config.cpu_violation_samples.max(1),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::from_config(&SupervisorConfig::default())
    }
}

/// 한 번의 샘플
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// 상주 메모리 (바이트)
    pub memory_bytes: u64,
    /// CPU 사용률 (%)
    pub cpu_percent: f32,
}

/// 단일 프로세스의 리소스 사용량을 추적하고 한도 위반을 판정합니다.
pub struct ResourceMonitor {
    system: System,
    pid: Pid,
    limits: ResourceLimits,
    cpu_strikes: u32,
}

impl ResourceMonitor {
    /// 새 모니터를 생성합니다.
    pub fn new(pid: u32, limits: ResourceLimits) -> Self {
        Self {
            system: System::new_with_specifics(RefreshKind::nothing()),
            pid: Pid::from_u32(pid),
            limits,
            cpu_strikes: 0,
        }
    }

    /// 현재 사용량을 샘플링합니다. 프로세스가 없으면 `None`입니다.
    pub fn sample(&mut self) -> Option<ResourceSample> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        self.system.process(self.pid).map(|p| ResourceSample {
            memory_bytes: p.memory(),
            cpu_percent: p.cpu_usage(),
        })
    }

    /// 샘플을 한도와 비교합니다.
    ///
    /// 메모리는 한 번만 넘어도 위반입니다. CPU는 연속 샘플 수를 채워야 위반입니다.
    /// 위반이면 사유를 반환합니다.
    pub fn check(&mut self, sample: ResourceSample) -> Option<String> {
        if let Some(max) = self.limits.max_memory_bytes {
            if sample.memory_bytes > max {
                return Some(format!(
                    "memory {} MB above limit {} MB",
                    sample.memory_bytes / (1024 * 1024),
                    max / (1024 * 1024)
                ));
            }
        }

        if sample.cpu_percent > self.limits.max_cpu_percent {
            self.cpu_strikes += 1;
        } else {
            self.cpu_strikes = 0;
        }
        if self.cpu_strikes >= self.limits.cpu_violation_samples {
            return Some(format!(
                "cpu {:.0}% above limit {:.0}% for {} consecutive samples",
                sample.cpu_percent, self.limits.max_cpu_percent, self.cpu_strikes
            ));
        }
        None
    }
}
