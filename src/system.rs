//! Check that the external programs a run depends on are installed.
//!
//! The formatter itself is required, and grohtml shells out to `pnmtopng`
//! (netpbm) and `psselect` (psutils) when a page contains tables, equations
//! or pictures.

/// A program looked up on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredTool {
    pub program: String,
    /// What the user should install when it is missing.
    pub provides: String,
}

impl RequiredTool {
    fn new(program: impl Into<String>, provides: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            provides: provides.into(),
        }
    }
}

/// Tools needed when rendering with `formatter_program`.
pub fn required_tools(formatter_program: &str) -> Vec<RequiredTool> {
    let formatter = if formatter_program == "groff" {
        RequiredTool::new("groff", "main part, groff, the document formatting system")
    } else {
        RequiredTool::new(formatter_program, "the configured formatter")
    };
    vec![
        formatter,
        RequiredTool::new("pnmtopng", "netpbm (or pnmtopng)"),
        RequiredTool::new("psselect", "psutils (or psselect)"),
    ]
}

/// Tools from `tools` that `is_installed` reports missing, in order.
pub fn missing_tools(
    tools: Vec<RequiredTool>,
    is_installed: impl Fn(&str) -> bool,
) -> Vec<RequiredTool> {
    tools
        .into_iter()
        .filter(|tool| !is_installed(&tool.program))
        .collect()
}

/// Look up every required tool on `PATH`.
pub fn check_system(formatter_program: &str) -> Vec<RequiredTool> {
    missing_tools(required_tools(formatter_program), |program| {
        which::which(program).is_ok()
    })
}
