//! Small form-control helpers shared by the pages.

use maud::{html, Markup};

#[must_use]
pub fn labeled_text_input(label: &str, name: &str, value: &str, placeholder: &str) -> Markup {
    html! {
        p {
            label { (label) }
            input type="text" name=(name) value=(value) placeholder=(placeholder);
        }
    }
}

#[must_use]
pub fn labeled_password_input(label: &str, name: &str) -> Markup {
    html! {
        p {
            label { (label) }
            input type="password" name=(name);
        }
    }
}

#[must_use]
pub fn hidden_input(name: &str, value: &str) -> Markup {
    html! {
        input type="hidden" name=(name) value=(value);
    }
}

#[must_use]
pub fn submit_button(label: &str) -> Markup {
    html! {
        button type="submit" { (label) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_input_escapes_value() {
        let markup = hidden_input("next", "\"/><script>").into_string();
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("name=\"next\""));
    }
}
