//! Alert boxes for mutation results and validation messages.

use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertVariant {
    Success,
    Error,
}

impl AlertVariant {
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A blocking message rendered at the top of a page.
#[derive(Debug, Clone)]
pub struct Alert<'a> {
    variant: AlertVariant,
    message: &'a str,
}

impl<'a> Alert<'a> {
    #[must_use]
    pub const fn success(message: &'a str) -> Self {
        Self {
            variant: AlertVariant::Success,
            message,
        }
    }

    #[must_use]
    pub const fn error(message: &'a str) -> Self {
        Self {
            variant: AlertVariant::Error,
            message,
        }
    }
}

impl Render for Alert<'_> {
    fn render(&self) -> Markup {
        html! {
            div class={ "alert " (self.variant.class()) } {
                (self.message)
            }
        }
    }
}
