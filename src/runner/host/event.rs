/// Kind of MIDI message a [`HiseEvent`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    NoteOn,
    NoteOff,
    Controller,
}

/// The MIDI event that triggered the current note or controller callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiseEvent {
    event_type: EventType,
    channel: u8,
    number: u8,
    value: u8,
    ignored: bool,
}

impl HiseEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        HiseEvent {
            event_type: EventType::NoteOn,
            channel,
            number: note,
            value: velocity,
            ignored: false,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        HiseEvent {
            event_type: EventType::NoteOff,
            channel,
            number: note,
            value: 0,
            ignored: false,
        }
    }

    pub fn controller(channel: u8, controller: u8, value: u8) -> Self {
        HiseEvent {
            event_type: EventType::Controller,
            channel,
            number: controller,
            value,
            ignored: false,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_note_on(&self) -> bool {
        self.event_type == EventType::NoteOn
    }

    pub fn is_note_off(&self) -> bool {
        self.event_type == EventType::NoteOff
    }

    pub fn is_controller(&self) -> bool {
        self.event_type == EventType::Controller
    }

    /// Note number of note events, -1 otherwise.
    pub fn note_number(&self) -> i64 {
        match self.event_type {
            EventType::NoteOn | EventType::NoteOff => self.number as i64,
            EventType::Controller => -1,
        }
    }

    pub fn velocity(&self) -> i64 {
        match self.event_type {
            EventType::NoteOn => self.value as i64,
            _ => 0,
        }
    }

    pub fn controller_number(&self) -> i64 {
        match self.event_type {
            EventType::Controller => self.number as i64,
            _ => -1,
        }
    }

    pub fn controller_value(&self) -> i64 {
        match self.event_type {
            EventType::Controller => self.value as i64,
            _ => 0,
        }
    }

    pub fn ignore_event(&mut self, ignore: bool) {
        self.ignored = ignore;
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_depend_on_type() {
        let on = HiseEvent::note_on(1, 64, 100);
        assert_eq!(on.note_number(), 64);
        assert_eq!(on.velocity(), 100);
        assert_eq!(on.controller_number(), -1);

        let cc = HiseEvent::controller(2, 1, 127);
        assert_eq!(cc.note_number(), -1);
        assert_eq!(cc.controller_number(), 1);
        assert_eq!(cc.controller_value(), 127);
        assert_eq!(cc.channel(), 2);
    }

    #[test]
    fn test_ignore_flag() {
        let mut off = HiseEvent::note_off(1, 60);
        assert!(!off.is_ignored());
        off.ignore_event(true);
        assert!(off.is_ignored());
    }
}
