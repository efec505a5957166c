//! 메모리 사용량 측정.
//!
//! 리눅스에서는 `/proc`을 읽고, 그 외 플랫폼에서는 측정값이 없습니다.

/// 한 시점의 메모리 측정값.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    /// 현재 프로세스 RSS (바이트)
    pub rss_bytes: u64,
    /// 전체 메모리 대비 RSS 비율 (%)
    pub used_pct: f64,
}

pub trait MemoryProbe: Send + Sync {
    /// 측정할 수 없으면 `None`.
    fn sample(&self) -> Option<MemorySample>;
}

/// 현재 프로세스 메모리.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    #[cfg(target_os = "linux")]
    fn sample(&self) -> Option<MemorySample> {
        use procfs::Current;

        let stat = procfs::process::Process::myself()
            .and_then(|p| p.stat())
            .ok()?;
        let meminfo = procfs::Meminfo::current().ok()?;

        let total = meminfo.mem_total;
        if total == 0 {
            return None;
        }
        let rss_bytes = stat.rss * procfs::page_size();

        Some(MemorySample {
            rss_bytes,
            used_pct: rss_bytes as f64 / total as f64 * 100.0,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn sample(&self) -> Option<MemorySample> {
        None
    }
}

/// 고정 값을 돌려주는 측정기 (테스트용).
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub Option<f64>);

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        self.0.map(|used_pct| MemorySample {
            rss_bytes: 0,
            used_pct,
        })
    }
}
