//! Job description files

use std::path::Path;

use crate::config::SchedulerConfig;

/// Everything a step job needs to know, rendered as a batch script
pub(crate) struct JobDescription<'a> {
    pub pipeline_id: &'a str,
    pub step_name: &'a str,
    pub worker_id: &'a str,
    pub control_plane_url: &'a str,
    pub stage_script: &'a Path,
    pub image_path: &'a Path,
    pub config: &'a SchedulerConfig,
}

impl JobDescription<'_> {
    pub fn render(&self) -> String {
        let work_dir = self.config.work_dir.display();

        let mut lines = vec![
            "#!/bin/bash".to_string(),
            format!(
                "#SBATCH --job-name={}_{}",
                directive_safe(self.step_name),
                directive_safe(self.pipeline_id)
            ),
            format!("#SBATCH --output={}/slurm_%j.out", work_dir),
            format!("#SBATCH --error={}/slurm_%j.err", work_dir),
            format!("#SBATCH --partition={}", self.config.partition),
            format!("#SBATCH --mem={}", self.config.memory),
            "#SBATCH --nodes=1".to_string(),
            "#SBATCH --ntasks=1".to_string(),
            format!("#SBATCH --cpus-per-task={}", self.config.cpus_per_task),
            "#SBATCH --ntasks-per-node=1".to_string(),
            String::new(),
            format!("export PIPELINE_ID={}", quote(self.pipeline_id)),
            format!("export STEP_NAME={}", quote(self.step_name)),
            format!("export WORKER_ID={}", quote(self.worker_id)),
            format!("export CORE_SERVER_URL={}", quote(self.control_plane_url)),
            String::new(),
        ];

        if let Some(env) = &self.config.conda_env {
            lines.push("eval \"$(conda shell.bash hook)\"".to_string());
            lines.push(format!("conda activate {}", quote(env)));
            lines.push(String::new());
        }

        lines.push(format!(
            "python3 {} --image-path {}",
            quote(&self.stage_script.to_string_lossy()),
            quote(&self.image_path.to_string_lossy())
        ));
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Replaces characters that would end a directive line or a file name
///
/// Directive lines are read by the scheduler before the shell sees the
/// script, so they cannot be quoted.
pub(crate) fn directive_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_control() || c.is_whitespace() || c == '/' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Single-quotes a value for the shell
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            work_dir: PathBuf::from("/scratch/sluice"),
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_render_directives_and_exports() {
        let config = config();
        let job = JobDescription {
            pipeline_id: "pl-1",
            step_name: "bit_conversion",
            worker_id: "worker_1",
            control_plane_url: "http://cp:8000",
            stage_script: Path::new("/opt/stages/pipeline_stage_16bit_to_8bit.py"),
            image_path: Path::new("/data/in/sample.v3draw"),
            config: &config,
        };

        let text = job.render();
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("#SBATCH --job-name=bit_conversion_pl-1\n"));
        assert!(text.contains("#SBATCH --error=/scratch/sluice/slurm_%j.err\n"));
        assert!(text.contains("#SBATCH --partition=CPU\n"));
        assert!(text.contains("#SBATCH --mem=50G\n"));
        assert!(text.contains("#SBATCH --cpus-per-task=2\n"));
        assert!(text.contains("export PIPELINE_ID='pl-1'\n"));
        assert!(text.contains("export CORE_SERVER_URL='http://cp:8000'\n"));
        assert!(text.contains(
            "python3 '/opt/stages/pipeline_stage_16bit_to_8bit.py' --image-path '/data/in/sample.v3draw'"
        ));
        assert!(!text.contains("conda"));
    }

    #[test]
    fn test_render_conda_activation() {
        let config = SchedulerConfig {
            conda_env: Some("imaging".to_string()),
            ..config()
        };
        let job = JobDescription {
            pipeline_id: "pl-1",
            step_name: "downsample",
            worker_id: "w",
            control_plane_url: "http://cp:8000",
            stage_script: Path::new("stage.py"),
            image_path: Path::new("in.v3draw"),
            config: &config,
        };

        assert!(job.render().contains("conda activate 'imaging'\n"));
    }

    #[test]
    fn test_render_keeps_hostile_ids_inside_the_directive() {
        let config = config();
        let job = JobDescription {
            pipeline_id: "pl-1\ntouch /tmp/pwned",
            step_name: "downsample",
            worker_id: "w",
            control_plane_url: "http://cp:8000",
            stage_script: Path::new("stage.py"),
            image_path: Path::new("in.v3draw"),
            config: &config,
        };

        let text = job.render();
        assert!(text.contains("#SBATCH --job-name=downsample_pl-1_touch__tmp_pwned\n"));
        assert!(!text.lines().any(|line| line.starts_with("touch")));
        assert!(text.contains("export PIPELINE_ID='pl-1\ntouch /tmp/pwned'\n"));

        // Every directive still precedes the first shell line
        let directives: Vec<_> = text
            .lines()
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();
        assert_eq!(directives.len(), 9);
        assert!(directives.iter().all(|line| line.starts_with("#SBATCH ")));
    }

    #[test]
    fn test_directive_safe() {
        assert_eq!(directive_safe("pl-1"), "pl-1");
        assert_eq!(directive_safe("a b\tc/d\re"), "a_b_c_d_e");
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
