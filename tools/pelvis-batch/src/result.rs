//! 批处理结果.

use pelvis_berry::pipeline::PelvisReport;
use pelvis_berry::BoneResult;
use std::io::{self, Write};
use std::time::Duration;

/// 单个病例的结果.
struct CaseResult {
    name: String,
    outcome: BoneResult<PelvisReport>,
    elapsed: Duration,
}

/// 将 `case` 的结果写进 `w` 中.
fn describe_into<W: Write>(case: &CaseResult, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Case `{}`:", case.name)?;
    match &case.outcome {
        Ok(r) => {
            writeln!(w, "{S4}Threshold: {} (dips {:?})", r.threshold, r.dips)?;
            writeln!(w, "{S4}Pelvis slices: [{}, {})", r.bounds.lower(), r.bounds.upper())?;
            writeln!(w, "{S4}Skeleton voxels: {}", r.skeleton_voxels)?;
            writeln!(w, "{S4}Cropped shape: {:?}", r.cropped_shape)?;
        }
        Err(e) => writeln!(w, "{S4}Failed: {e}")?,
    }
    write!(w, "{S4}Time: {} ms", case.elapsed.as_millis())?;
    Ok(())
}

/// 批处理最终结果.
pub struct BatchResult {
    data: Vec<CaseResult>,
}

impl BatchResult {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            data: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, name: String, outcome: BoneResult<PelvisReport>, elapsed: Duration) {
        self.data.push(CaseResult {
            name,
            outcome,
            elapsed,
        });
    }

    /// 失败的病例个数.
    pub fn failures(&self) -> usize {
        self.data.iter().filter(|c| c.outcome.is_err()).count()
    }

    /// 输出运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for case in self.data.iter() {
            if describe_into(case, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();

            utils::sep();
        }
        println!(
            "{} cases, {} failed",
            self.data.len(),
            self.failures()
        );
    }
}
