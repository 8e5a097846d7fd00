//! Bash entry scripts executed inside the build container.
//!
//! Each script is the shared prelude in `scripts/common.sh` followed by a
//! tool-specific body. The prelude refuses to run outside `/var/task`, reads
//! and immediately deletes the credentials file, and hands ownership of the
//! build directory back to the owner of the mount on exit.

use stratum_schema::BuildTool;

const PIP: &str = concat!(
    include_str!("../scripts/common.sh"),
    include_str!("../scripts/pip.sh")
);
const POETRY: &str = concat!(
    include_str!("../scripts/common.sh"),
    include_str!("../scripts/poetry.sh")
);
const UV: &str = concat!(
    include_str!("../scripts/common.sh"),
    include_str!("../scripts/uv.sh")
);

pub fn entry_script(tool: BuildTool) -> &'static str {
    match tool {
        BuildTool::Pip => PIP,
        BuildTool::Poetry => POETRY,
        BuildTool::Uv => UV,
    }
}
