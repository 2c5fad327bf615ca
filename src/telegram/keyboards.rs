//! Menu captions and reply keyboards.
//!
//! The caption strings do double duty: they are the button labels, and the
//! first line of every prompt the bot sends for them. Reply classification
//! keys on that first line, so prompts and captions must stay in lockstep —
//! see [`UserAction::prompt`] / [`AdminAction::prompt`] and the tests below.

use teloxide::types::{KeyboardButton, ReplyKeyboardMarkup};

pub const CHECK_IP: &str = "Check IP";
pub const LIST_CHECKED_IPS: &str = "Get list of checked IPs";
pub const LIST_CHECKED_IP_RESULTS: &str = "Get list of checked IPs results";

pub const SEND_BROADCAST: &str = "Send broadcast message";
pub const LIST_USER_CHECKED_IPS: &str = "Get list of user's checked IPs";
pub const ADD_ADMIN: &str = "Add new admin";
pub const REMOVE_ADMIN: &str = "Remove admin";

/// Actions reachable from the regular-user keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    CheckIp,
    ListCheckedIps,
    ListCheckedIpResults,
}

impl UserAction {
    /// Match a caption (button text or prompt first line) to its action.
    pub fn from_caption(text: &str) -> Option<Self> {
        match text {
            CHECK_IP => Some(Self::CheckIp),
            LIST_CHECKED_IPS => Some(Self::ListCheckedIps),
            LIST_CHECKED_IP_RESULTS => Some(Self::ListCheckedIpResults),
            _ => None,
        }
    }

    /// Prompt sent when the action expects a reply. The caption is the first
    /// line — that is what reply classification reads back.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            Self::CheckIp => Some(
                "Check IP\n\
                 Reply to this message with IP address what you want to check\n\
                 Examples: <pre>8.8.8.8</pre>",
            ),
            // The listing actions answer immediately; nothing to reply to.
            Self::ListCheckedIps | Self::ListCheckedIpResults => None,
        }
    }
}

/// Actions reachable from the admin keyboard. All of them are prompt→reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Broadcast,
    ListUserCheckedIps,
    AddAdmin,
    RemoveAdmin,
}

impl AdminAction {
    /// Match a caption (button text or prompt first line) to its action.
    pub fn from_caption(text: &str) -> Option<Self> {
        match text {
            SEND_BROADCAST => Some(Self::Broadcast),
            LIST_USER_CHECKED_IPS => Some(Self::ListUserCheckedIps),
            ADD_ADMIN => Some(Self::AddAdmin),
            REMOVE_ADMIN => Some(Self::RemoveAdmin),
            _ => None,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Broadcast => {
                "Send broadcast message\n\
                 Reply to this message with broadcast message text"
            }
            Self::ListUserCheckedIps => {
                "Get list of user's checked IPs\n\
                 Reply to this message with user Telegram ID"
            }
            Self::AddAdmin => {
                "Add new admin\n\
                 Reply to this message with new admin Telegram ID\n\
                 NB: new admin should have a dialogue with me!"
            }
            Self::RemoveAdmin => {
                "Remove admin\n\
                 Reply to this message with deprecated admin Telegram ID"
            }
        }
    }
}

/// Which reply keyboard an outbound message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    User,
    Admin,
}

impl Keyboard {
    pub fn markup(&self) -> ReplyKeyboardMarkup {
        match self {
            Self::User => user_keyboard(),
            Self::Admin => admin_keyboard(),
        }
    }
}

pub fn user_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::new(vec![
        vec![KeyboardButton::new(CHECK_IP)],
        vec![
            KeyboardButton::new(LIST_CHECKED_IPS),
            KeyboardButton::new(LIST_CHECKED_IP_RESULTS),
        ],
    ])
}

pub fn admin_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(SEND_BROADCAST),
            KeyboardButton::new(LIST_USER_CHECKED_IPS),
        ],
        vec![KeyboardButton::new(ADD_ADMIN), KeyboardButton::new(REMOVE_ADMIN)],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::dispatch::first_line;

    #[test]
    fn every_prompt_starts_with_its_caption() {
        // Reply classification reads the first line of the prompt back as the
        // caption; a drifted prompt would orphan its reply action.
        let check_ip = UserAction::CheckIp.prompt().expect("check ip prompts");
        assert_eq!(first_line(check_ip), CHECK_IP);

        for action in [
            AdminAction::Broadcast,
            AdminAction::ListUserCheckedIps,
            AdminAction::AddAdmin,
            AdminAction::RemoveAdmin,
        ] {
            let caption = match action {
                AdminAction::Broadcast => SEND_BROADCAST,
                AdminAction::ListUserCheckedIps => LIST_USER_CHECKED_IPS,
                AdminAction::AddAdmin => ADD_ADMIN,
                AdminAction::RemoveAdmin => REMOVE_ADMIN,
            };
            assert_eq!(first_line(action.prompt()), caption);
        }
    }

    #[test]
    fn captions_map_back_to_actions() {
        assert_eq!(UserAction::from_caption("Check IP"), Some(UserAction::CheckIp));
        assert_eq!(
            UserAction::from_caption("Get list of checked IPs results"),
            Some(UserAction::ListCheckedIpResults)
        );
        assert_eq!(UserAction::from_caption("Send broadcast message"), None);

        assert_eq!(AdminAction::from_caption("Remove admin"), Some(AdminAction::RemoveAdmin));
        assert_eq!(AdminAction::from_caption("Check IP"), None);
        assert_eq!(AdminAction::from_caption("remove admin"), None, "captions are case sensitive");
    }

    #[test]
    fn keyboards_carry_the_caption_sets() {
        let user = user_keyboard();
        assert_eq!(user.keyboard.len(), 2);
        assert_eq!(user.keyboard[0].len(), 1);
        assert_eq!(user.keyboard[1].len(), 2);

        let admin = admin_keyboard();
        assert_eq!(admin.keyboard.len(), 2);
        assert_eq!(admin.keyboard[0].len(), 2);
        assert_eq!(admin.keyboard[1].len(), 2);
    }
}
