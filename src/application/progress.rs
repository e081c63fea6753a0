//! 进度统计：已处理字符、吞吐与剩余时间估计

use std::time::{Duration, Instant};

/// 把时长格式化为 `00d 00h 00m 00s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{:02}d {:02}h {:02}m {:02}s", days, hours, minutes, seconds)
}

/// 每章字符吞吐（字符/秒），耗时为零时为 None
pub fn chars_per_sec(chars: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| chars as f64 / secs)
}

/// 进度跟踪器
///
/// 剩余时间只按本次运行实际合成的字符估算，断点恢复跳过的章节不计入吞吐。
/// 吞吐按合成开始以来的墙钟时间计算，引擎池并行时各章耗时重叠，不能累加。
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    total_chars: usize,
    processed_chars: usize,
    synthesized_chars: usize,
    synthesis_started: Option<Instant>,
}

impl ProgressTracker {
    pub fn new(total_chars: usize) -> Self {
        Self {
            started: Instant::now(),
            total_chars,
            processed_chars: 0,
            synthesized_chars: 0,
            synthesis_started: None,
        }
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn processed_chars(&self) -> usize {
        self.processed_chars
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 记录一个已有产物、未合成的章节
    pub fn record_skipped(&mut self, chars: usize) {
        self.processed_chars += chars;
    }

    /// 开始合成待处理章节，只有第一次调用生效
    pub fn start_synthesis(&mut self) {
        self.synthesis_started.get_or_insert_with(Instant::now);
    }

    /// 记录一个实际合成过的章节（失败的章节也要记录，它的字符不会再处理）
    pub fn record_synthesized(&mut self, chars: usize) {
        self.processed_chars += chars;
        self.synthesized_chars += chars;
    }

    pub fn remaining_chars(&self) -> usize {
        self.total_chars.saturating_sub(self.processed_chars)
    }

    /// 估计剩余时间，还没有吞吐数据时为 None
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let synthesis_elapsed = self.synthesis_started?.elapsed();
        self.estimate_after(synthesis_elapsed)
    }

    fn estimate_after(&self, synthesis_elapsed: Duration) -> Option<Duration> {
        let rate = chars_per_sec(self.synthesized_chars, synthesis_elapsed)?;
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.remaining_chars() as f64 / rate))
    }
}
