//! Level macros
//!
//! ```ignore
//! canopy::i!("User %s logged in", name);
//! canopy::w!(tag: "Net", "retrying in %dms", delay);
//! canopy::e!(tag: "Net", error: err, "request failed");
//! canopy::d!(forest: &my_forest, "scoped to an injected forest");
//! ```
//!
//! Options come first, in any order, each followed by a comma:
//! `forest: &Forest`, `tag: &str`, `error: SharedError`. The message
//! expression is only evaluated when a tree actually formats it.

#[doc(hidden)]
#[macro_export]
macro_rules! __canopy_log {
    (@opts [$f:expr] [$t:expr] [$e:expr] $level:expr; forest: $nf:expr, $($rest:tt)+) => {
        $crate::__canopy_log!(@opts [$nf] [$t] [$e] $level; $($rest)+)
    };
    (@opts [$f:expr] [$t:expr] [$e:expr] $level:expr; tag: $nt:expr, $($rest:tt)+) => {
        $crate::__canopy_log!(
            @opts [$f] [::core::option::Option::Some($nt)] [$e] $level; $($rest)+
        )
    };
    (@opts [$f:expr] [$t:expr] [$e:expr] $level:expr; error: $ne:expr, $($rest:tt)+) => {
        $crate::__canopy_log!(
            @opts [$f] [$t] [::core::option::Option::Some(&$ne)] $level; $($rest)+
        )
    };
    (@opts [$f:expr] [$t:expr] [$e:expr] $level:expr; $msg:expr $(, $arg:expr)* $(,)?) => {
        $crate::Forest::log(
            $f,
            $level,
            $crate::Template::Lazy(&|| ::std::string::String::from($msg)),
            &[$(&$arg as &dyn ::core::fmt::Display),*],
            $t,
            $e,
            $crate::SourceLocation::new(
                ::core::file!(),
                ::core::line!(),
                ::core::column!(),
            )
            .with_function(::core::module_path!()),
        )
    };
}

/// Log at an explicit level
#[macro_export]
macro_rules! log {
    ($level:expr, $($rest:tt)+) => {
        $crate::__canopy_log!(
            @opts [$crate::global()] [::core::option::Option::None]
            [::core::option::Option::None] $level; $($rest)+
        )
    };
}

/// Log at verbose level
#[macro_export]
macro_rules! v {
    ($($rest:tt)+) => { $crate::log!($crate::LogLevel::Verbose, $($rest)+) };
}

/// Log at debug level
#[macro_export]
macro_rules! d {
    ($($rest:tt)+) => { $crate::log!($crate::LogLevel::Debug, $($rest)+) };
}

/// Log at info level
#[macro_export]
macro_rules! i {
    ($($rest:tt)+) => { $crate::log!($crate::LogLevel::Info, $($rest)+) };
}

/// Log at warning level
#[macro_export]
macro_rules! w {
    ($($rest:tt)+) => { $crate::log!($crate::LogLevel::Warning, $($rest)+) };
}

/// Log at error level
#[macro_export]
macro_rules! e {
    ($($rest:tt)+) => { $crate::log!($crate::LogLevel::Error, $($rest)+) };
}
