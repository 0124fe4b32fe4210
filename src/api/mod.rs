pub mod anomaly;
pub mod clock;
pub mod devices;
pub mod leave;
pub mod mapping;
pub mod presence;

use chrono::{Local, NaiveDateTime};

/// Wall-clock time of the server; every stored timestamp is local naive time.
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
