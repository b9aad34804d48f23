//! Named-pipe transport
//!
//! Only Unix FIFOs are supported.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    } else {
        compile_error!("ems-runtime needs POSIX named pipes");
    }
}
