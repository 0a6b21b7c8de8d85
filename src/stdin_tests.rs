//! Unit tests for the console command parser

#[cfg(test)]
mod tests {
    use crate::session::ControlAction;
    use crate::stdin::parse_line;

    #[test]
    fn test_parse_buttons() {
        assert_eq!(parse_line("<<"), Some(ControlAction::SeekBackLarge));
        assert_eq!(parse_line("<"), Some(ControlAction::SeekBack));
        assert_eq!(parse_line(">"), Some(ControlAction::SeekForward));
        assert_eq!(parse_line(">>"), Some(ControlAction::SeekForwardLarge));
        assert_eq!(parse_line("p"), Some(ControlAction::PlayPause));
        assert_eq!(parse_line("stop"), Some(ControlAction::Stop));
        assert_eq!(parse_line("vol+"), Some(ControlAction::VolumeUp));
        assert_eq!(parse_line("vol-"), Some(ControlAction::VolumeDown));
        assert_eq!(parse_line("spd+"), Some(ControlAction::SpeedUp));
        assert_eq!(parse_line("spd-"), Some(ControlAction::SpeedDown));
        assert_eq!(parse_line("loop"), Some(ControlAction::ToggleLoop));
        assert_eq!(parse_line("bass"), Some(ControlAction::ToggleBassBoost));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_line("seek -30"), Some(ControlAction::Seek(-30)));
        assert_eq!(parse_line("  seek   12 "), Some(ControlAction::Seek(12)));
        assert_eq!(parse_line("vol 40000"), Some(ControlAction::SetVolume(40000)));
        assert_eq!(
            parse_line("cmd cycle mute"),
            Some(ControlAction::Raw("cycle mute".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("seek"), None);
        assert_eq!(parse_line("seek forward"), None);
        assert_eq!(parse_line("vol"), None);
        assert_eq!(parse_line("cmd"), None);
        assert_eq!(parse_line("loop now"), None);
        assert_eq!(parse_line("dance"), None);
    }
}
