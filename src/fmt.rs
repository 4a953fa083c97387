//! Internal logging macros.
//!
//! Forward to the `log` facade when the `log` feature is enabled and compile
//! to nothing otherwise, so `no_std` builds carry no logging cost.

#![macro_use]
#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::trace!($($arg)+);
        #[cfg(not(feature = "log"))]
        let _ = ::core::format_args!($($arg)+);
    }};
}

macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)+);
        #[cfg(not(feature = "log"))]
        let _ = ::core::format_args!($($arg)+);
    }};
}

macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::info!($($arg)+);
        #[cfg(not(feature = "log"))]
        let _ = ::core::format_args!($($arg)+);
    }};
}

macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::warn!($($arg)+);
        #[cfg(not(feature = "log"))]
        let _ = ::core::format_args!($($arg)+);
    }};
}
