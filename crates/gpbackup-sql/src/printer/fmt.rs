/// Appends formatted text to a `String`.
macro_rules! fmt {
    ($dst:expr, $($arg:tt)*) => {{
        use ::std::fmt::Write as _;
        // Writing to a String cannot fail.
        let _ = write!($dst, $($arg)*);
    }};
}
