/// Builds [`Fields`](crate::Fields) from `key => value` pairs.
///
/// Keys are anything convertible into a `String`, values anything
/// convertible into a [`Value`](crate::Value). Insertion order is kept.
///
/// # Examples
///
/// ```
/// use fieldscope::{Logger, SharedBuffer, fields};
///
/// let buffer = SharedBuffer::new();
/// let logger = Logger::new(buffer.clone()).with_fields(fields! {
///     "user" => "alice",
///     "attempt" => 3,
///     "cached" => false,
/// });
/// logger.info("login");
///
/// let line = buffer.contents();
/// assert!(line.contains("attempt=3 cached=false user=alice"));
///
/// assert!(fields!().is_empty());
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(
                ::std::string::String::from($key),
                $crate::Value::from($value),
            );
        )+
        fields
    }};
}

/// Expands to the per-level convenience methods of a type that has
/// `log`, `logf` and `logln` methods.
macro_rules! level_methods {
    () => {
        $crate::macros::level_methods! {
            Trace: trace, tracef, traceln;
            Debug: debug, debugf, debugln;
            Info: info, infof, infoln;
            Warn: warn, warnf, warnln;
            Error: error, errorf, errorln;
            Fatal: fatal, fatalf, fatalln;
            Panic: panic, panicf, panicln;
        }
    };
    ($($level:ident: $plain:ident, $formatted:ident, $line:ident;)*) => {
        $(
            #[doc = concat!("Emits `message` at [`Level::", stringify!($level), "`](crate::Level::", stringify!($level), ").")]
            #[inline]
            pub fn $plain(&self, message: impl ::std::fmt::Display) {
                self.log($crate::Level::$level, message)
            }

            #[doc = concat!("Emits `format_args!` output at [`Level::", stringify!($level), "`](crate::Level::", stringify!($level), ").")]
            #[inline]
            pub fn $formatted(&self, args: ::std::fmt::Arguments<'_>) {
                self.logf($crate::Level::$level, args)
            }

            #[doc = concat!("Emits `parts` separated by spaces at [`Level::", stringify!($level), "`](crate::Level::", stringify!($level), ").")]
            #[inline]
            pub fn $line(&self, parts: &[&dyn ::std::fmt::Display]) {
                self.logln($crate::Level::$level, parts)
            }
        )*
    };
}

pub(crate) use level_methods;
