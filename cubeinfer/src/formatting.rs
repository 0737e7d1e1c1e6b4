/// Format a value for compact human-readable output.
pub trait FormatValue {
    fn format_value(&self) -> String;
}

impl FormatValue for f32 {
    fn format_value(&self) -> String {
        format!("{:.4}", self)
    }
}

macro_rules! impl_format_display {
    ($($ty:ty),+ $(,)?) => {
        $(impl FormatValue for $ty {
            fn format_value(&self) -> String {
                self.to_string()
            }
        })+
    };
}

impl_format_display!(i32, i64, usize, bool);

/// Format a slice with head/tail truncation.
pub fn format_truncated<T: FormatValue>(data: &[T]) -> String {
    let len = data.len();
    if len == 0 {
        return "{}".to_string();
    }
    if len <= 6 {
        let joined = data
            .iter()
            .map(FormatValue::format_value)
            .collect::<Vec<_>>()
            .join(", ");
        return format!("{{{}}}", joined);
    }
    let head = data[..3]
        .iter()
        .map(FormatValue::format_value)
        .collect::<Vec<_>>()
        .join(", ");
    let tail = data[len - 3..]
        .iter()
        .map(FormatValue::format_value)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{} ... {}}} ({} values)", head, tail, len)
}
