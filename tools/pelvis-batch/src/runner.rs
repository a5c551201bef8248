//! 程序运行函数.

use crate::result::BatchResult;
use log::{error, info};
use pelvis_berry::pipeline::PelvisPipeline;
use pelvis_berry::{BoneConfig, BoneError, BoneResult};
use std::time::Instant;
use utils::loader;

/// 实际运行. 逐个处理输入目录下的病例, 单个病例失败不影响其它病例.
pub fn run() -> BoneResult<BatchResult> {
    let input = loader::input_dir_from_env_or_home()
        .filter(|p| p.is_dir())
        .ok_or(BoneError::InvalidConfig("input directory not found"))?;
    let output = loader::output_dir_from_env_or_home()
        .ok_or(BoneError::InvalidConfig("output directory not found"))?;

    let workers = utils::workers_from_env();
    let pipeline = PelvisPipeline::new(BoneConfig::default().with_workers(workers))?;
    let cases = loader::list_cases(&input)?;
    info!(
        "{} cases under {input:?}, {workers} workers, writing to {output:?}",
        cases.len()
    );

    let mut result = BatchResult::with_capacity(cases.len());
    for case in cases {
        let start = Instant::now();
        let outcome = pipeline.run(&case.path, output.join(&case.name));
        match &outcome {
            Ok(r) => info!(
                "`{}`: threshold {}, slices [{}, {})",
                case.name,
                r.threshold,
                r.bounds.lower(),
                r.bounds.upper()
            ),
            Err(e) => error!("`{}`: {e}", case.name),
        }
        result.push(case.name, outcome, start.elapsed());
    }
    Ok(result)
}
