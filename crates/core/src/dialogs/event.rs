//! Inbound chat events and the matchers the step registry routes them by.

/// A chat event already reduced to what routing needs. Delivery details
/// (who sent it, which message to edit) travel in the `StepContext`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text message, commands included.
    Text { text: String },
    /// Inline-button press carrying its callback payload.
    Button { data: String },
}

impl InboundEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn button(data: impl Into<String>) -> Self {
        Self::Button { data: data.into() }
    }

    pub fn is_button(&self) -> bool {
        matches!(self, Self::Button { .. })
    }

    pub fn button_data(&self) -> Option<&str> {
        match self {
            Self::Button { data } => Some(data),
            Self::Text { .. } => None,
        }
    }

    /// Command word of a `/command` message, with any `@botname` suffix
    /// stripped. `None` for free text and button presses.
    pub fn command(&self) -> Option<&str> {
        let Self::Text { text } = self else {
            return None;
        };
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        (!name.is_empty()).then_some(name)
    }

    /// Free text is any text message that is not a command.
    pub fn free_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } if !text.trim_start().starts_with('/') => Some(text),
            _ => None,
        }
    }
}

/// Route predicate. Routes are checked in registration order and the
/// first match wins, so specific matchers must be registered before
/// broad ones (`Exact` before `Prefix` before `AnyButton`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventMatcher {
    /// Bare `/word` command.
    Command(&'static str),
    /// Any text message that is not a command.
    FreeText,
    /// Button payload equals the string exactly.
    Exact(&'static str),
    /// Button payload starts with the prefix.
    Prefix(&'static str),
    /// Any button press at all.
    AnyButton,
}

impl EventMatcher {
    pub fn matches(&self, event: &InboundEvent) -> bool {
        match self {
            Self::Command(word) => event.command() == Some(word),
            Self::FreeText => event.free_text().is_some(),
            Self::Exact(payload) => event.button_data() == Some(payload),
            Self::Prefix(prefix) => {
                event.button_data().is_some_and(|data| data.starts_with(prefix))
            }
            Self::AnyButton => event.is_button(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventMatcher, InboundEvent};

    #[test]
    fn command_parsing_strips_slash_and_bot_suffix() {
        assert_eq!(InboundEvent::text("/cancel").command(), Some("cancel"));
        assert_eq!(InboundEvent::text("  /new@pricelog_bot  ").command(), Some("new"));
        assert_eq!(InboundEvent::text("hello").command(), None);
        assert_eq!(InboundEvent::text("/").command(), None);
        assert_eq!(InboundEvent::button("menu_nav_new").command(), None);
    }

    #[test]
    fn free_text_excludes_commands_and_buttons() {
        assert_eq!(InboundEvent::text("120.50").free_text(), Some("120.50"));
        assert_eq!(InboundEvent::text("/skip_remark_batch").free_text(), None);
        assert_eq!(InboundEvent::button("x").free_text(), None);
    }

    #[test]
    fn matchers_distinguish_buttons_from_text() {
        let press = InboundEvent::button("create_s_prod_carrot");
        assert!(EventMatcher::Prefix("create_s_prod_").matches(&press));
        assert!(EventMatcher::AnyButton.matches(&press));
        assert!(!EventMatcher::Exact("create_s_prod_").matches(&press));
        assert!(!EventMatcher::FreeText.matches(&press));

        let text = InboundEvent::text("carrot");
        assert!(EventMatcher::FreeText.matches(&text));
        assert!(!EventMatcher::AnyButton.matches(&text));
        assert!(!EventMatcher::Prefix("carrot").matches(&text));
    }

    #[test]
    fn exact_matcher_requires_full_payload() {
        let press = InboundEvent::button("delete_do_yes");
        assert!(EventMatcher::Exact("delete_do_yes").matches(&press));
        assert!(!EventMatcher::Exact("delete_do").matches(&press));
    }
}
