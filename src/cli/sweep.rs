use rollforward::error::Result;
use rollforward::sweeper;

use super::{connect, control};

pub fn run(owner_id: i64, as_of: Option<&str>) -> Result<()> {
    let conn = connect()?;
    let ctl = control(as_of)?;
    let settled = sweeper::sweep(&conn, owner_id, &ctl)?;
    println!("Settled {settled} event(s) dated before {}", ctl.as_of);
    Ok(())
}
