/// last known state of the credential / connectivity, as shown by the status badge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApiStatus {
    #[default]
    Idle,
    Checking,
    Ready,
    Missing,
    Error,
}

impl ApiStatus {
    pub const ALL: [ApiStatus; 5] = [
        ApiStatus::Idle,
        ApiStatus::Checking,
        ApiStatus::Ready,
        ApiStatus::Missing,
        ApiStatus::Error,
    ];

    /// stable style key; renderers map it to a colour.
    pub fn style_key(self) -> &'static str {
        match self {
            ApiStatus::Idle => "is-idle",
            ApiStatus::Checking => "is-checking",
            ApiStatus::Ready => "is-ready",
            ApiStatus::Missing => "is-missing",
            ApiStatus::Error => "is-error",
        }
    }
}
