//! Escape sequence parser
//!
//! A byte-at-a-time state machine in the style of the DEC VT500 parser. It
//! knows nothing about the screen: each byte moves the machine to a new
//! state and may emit [`Action`]s, which [`super::Grid`] applies. Anything
//! outside a recognised combination is dropped and the machine returns to
//! ground, so hostile input can waste bytes but never corrupt state.

/// Maximum number of CSI parameters kept; extras are ignored
pub const MAX_PARAMS: usize = 16;

/// Maximum number of intermediate bytes kept
pub const MAX_INTERMEDIATES: usize = 2;

/// OSC strings longer than this are discarded
pub const MAX_OSC_LEN: usize = 4096;

/// Parser states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    /// Malformed CSI; swallow bytes up to the final byte
    CsiIgnore,
    OscString,
    /// ESC seen inside an OSC string
    OscEscape,
    /// DCS, SOS, PM and APC strings; contents are dropped
    StringPassthrough,
    /// ESC seen inside a passthrough string
    StringEscape,
}

/// A complete control sequence introduced by `ESC [`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsiSequence {
    /// Parameters in order; an omitted parameter is 0
    pub params: Vec<u16>,
    /// Private marker (`?`, `>`, `<` or `=`) directly after `ESC [`
    pub private: Option<u8>,
    pub intermediates: Vec<u8>,
    pub final_byte: u8,
}

impl CsiSequence {
    /// Parameter `idx`, with 0 and missing values replaced by `default`
    pub fn param_or(&self, idx: usize, default: u16) -> u16 {
        match self.params.get(idx) {
            Some(&0) | None => default,
            Some(&v) => v,
        }
    }

    /// Raw parameter `idx`, 0 if missing
    pub fn raw(&self, idx: usize) -> u16 {
        self.params.get(idx).copied().unwrap_or(0)
    }
}

/// Output of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Printable character (already UTF-8 decoded)
    Print(char),
    /// C0 control byte
    Execute(u8),
    Csi(CsiSequence),
    Esc { intermediates: Vec<u8>, final_byte: u8 },
    /// Complete OSC payload, without the terminator
    Osc(Vec<u8>),
}

/// Escape sequence state machine
#[derive(Debug, Default)]
pub struct Parser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    private: Option<u8>,
    intermediates: Vec<u8>,
    osc: Vec<u8>,
    osc_overflow: bool,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

const CAN: u8 = 0x18;
const SUB: u8 = 0x1a;
const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;
const DEL: u8 = 0x7f;

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Feed a buffer, calling `emit` for every action in order.
    pub fn feed<F: FnMut(Action)>(&mut self, bytes: &[u8], mut emit: F) {
        for &byte in bytes {
            self.advance(byte, &mut emit);
        }
    }

    /// Advance the machine by one byte.
    pub fn advance<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        if self.utf8_need > 0 {
            if (0x80..0xc0).contains(&byte) {
                self.utf8[self.utf8_len] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    let ch = std::str::from_utf8(&self.utf8[..self.utf8_len])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    self.utf8_need = 0;
                    self.utf8_len = 0;
                    emit(Action::Print(ch));
                }
                return;
            }
            // Truncated sequence
            self.utf8_need = 0;
            self.utf8_len = 0;
            emit(Action::Print(char::REPLACEMENT_CHARACTER));
        }

        // Transitions valid from every state
        match byte {
            CAN | SUB => {
                self.reset_to_ground();
                return;
            }
            ESC => {
                match self.state {
                    ParserState::OscString => self.state = ParserState::OscEscape,
                    ParserState::StringPassthrough => self.state = ParserState::StringEscape,
                    _ => self.enter_escape(),
                }
                return;
            }
            _ => {}
        }

        match self.state {
            ParserState::Ground => self.ground(byte, emit),
            ParserState::Escape => self.escape(byte, emit),
            ParserState::EscapeIntermediate => self.escape_intermediate(byte, emit),
            ParserState::CsiEntry => self.csi_entry(byte, emit),
            ParserState::CsiParam => self.csi_param(byte, emit),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, emit),
            ParserState::CsiIgnore => self.csi_ignore(byte, emit),
            ParserState::OscString => self.osc_string(byte, emit),
            ParserState::OscEscape => self.osc_escape(byte, emit),
            ParserState::StringPassthrough => {}
            ParserState::StringEscape => {
                if byte == b'\\' {
                    self.state = ParserState::Ground;
                } else {
                    self.enter_escape();
                    self.escape(byte, emit);
                }
            }
        }
    }

    /// Drop any partial sequence, as at end of stream. Returns true if
    /// something was discarded.
    pub fn flush(&mut self) -> bool {
        let partial = self.state != ParserState::Ground || self.utf8_need > 0;
        self.reset_to_ground();
        self.utf8_need = 0;
        self.utf8_len = 0;
        partial
    }

    fn reset_to_ground(&mut self) {
        self.state = ParserState::Ground;
        self.clear_sequence();
        self.osc.clear();
        self.osc_overflow = false;
    }

    fn clear_sequence(&mut self) {
        self.params.clear();
        self.current_param = None;
        self.private = None;
        self.intermediates.clear();
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.clear_sequence();
    }

    fn execute_c0<F: FnMut(Action)>(byte: u8, emit: &mut F) {
        if byte < 0x20 {
            emit(Action::Execute(byte));
        }
    }

    fn ground<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => emit(Action::Execute(byte)),
            0x20..=0x7e => emit(Action::Print(byte as char)),
            DEL => {}
            0xc2..=0xdf => self.start_utf8(byte, 2),
            0xe0..=0xef => self.start_utf8(byte, 3),
            0xf0..=0xf4 => self.start_utf8(byte, 4),
            _ => emit(Action::Print(char::REPLACEMENT_CHARACTER)),
        }
    }

    fn start_utf8(&mut self, byte: u8, need: usize) {
        self.utf8[0] = byte;
        self.utf8_len = 1;
        self.utf8_need = need;
    }

    fn escape<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            b'[' => {
                self.clear_sequence();
                self.state = ParserState::CsiEntry;
            }
            b']' => {
                self.osc.clear();
                self.osc_overflow = false;
                self.state = ParserState::OscString;
            }
            b'P' | b'X' | b'^' | b'_' => self.state = ParserState::StringPassthrough,
            0x20..=0x2f => {
                self.collect_intermediate(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            0x30..=0x7e => {
                self.state = ParserState::Ground;
                emit(Action::Esc {
                    intermediates: std::mem::take(&mut self.intermediates),
                    final_byte: byte,
                });
            }
            _ => self.state = ParserState::Ground,
        }
    }

    fn escape_intermediate<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            0x20..=0x2f => self.collect_intermediate(byte),
            0x30..=0x7e => {
                self.state = ParserState::Ground;
                emit(Action::Esc {
                    intermediates: std::mem::take(&mut self.intermediates),
                    final_byte: byte,
                });
            }
            _ => self.state = ParserState::Ground,
        }
    }

    fn collect_intermediate(&mut self, byte: u8) {
        if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(byte);
        }
    }

    fn push_digit(&mut self, byte: u8) {
        let digit = (byte - b'0') as u16;
        self.current_param = Some(
            self.current_param
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit),
        );
    }

    fn end_param(&mut self) {
        let value = self.current_param.take().unwrap_or(0);
        if self.params.len() < MAX_PARAMS {
            self.params.push(value);
        }
    }

    fn csi_entry<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            b'0'..=b'9' => {
                self.push_digit(byte);
                self.state = ParserState::CsiParam;
            }
            b';' | b':' => {
                self.end_param();
                self.state = ParserState::CsiParam;
            }
            b'<'..=b'?' => {
                self.private = Some(byte);
                self.state = ParserState::CsiParam;
            }
            0x20..=0x2f => {
                self.collect_intermediate(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7e => self.dispatch_csi(byte, emit),
            DEL => {}
            _ => self.reset_to_ground(),
        }
    }

    fn csi_param<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            b'0'..=b'9' => self.push_digit(byte),
            // Sub-parameters (38:2:r:g:b) are flattened into the list
            b';' | b':' => self.end_param(),
            b'<'..=b'?' => self.state = ParserState::CsiIgnore,
            0x20..=0x2f => {
                if self.current_param.is_some() {
                    self.end_param();
                }
                self.collect_intermediate(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7e => {
                if self.current_param.is_some() || !self.params.is_empty() {
                    self.end_param();
                }
                self.dispatch_csi(byte, emit);
            }
            DEL => {}
            _ => self.reset_to_ground(),
        }
    }

    fn csi_intermediate<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            0x20..=0x2f => self.collect_intermediate(byte),
            0x30..=0x3f => self.state = ParserState::CsiIgnore,
            0x40..=0x7e => self.dispatch_csi(byte, emit),
            DEL => {}
            _ => self.reset_to_ground(),
        }
    }

    fn csi_ignore<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            0x00..=0x1f => Self::execute_c0(byte, emit),
            0x40..=0x7e => self.reset_to_ground(),
            0x20..=0x3f | DEL => {}
            _ => self.reset_to_ground(),
        }
    }

    fn dispatch_csi<F: FnMut(Action)>(&mut self, final_byte: u8, emit: &mut F) {
        let seq = CsiSequence {
            params: std::mem::take(&mut self.params),
            private: self.private.take(),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
        };
        self.current_param = None;
        self.state = ParserState::Ground;
        emit(Action::Csi(seq));
    }

    fn osc_string<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        match byte {
            BEL => self.dispatch_osc(emit),
            0x00..=0x1f => {}
            _ => {
                if self.osc.len() < MAX_OSC_LEN {
                    self.osc.push(byte);
                } else {
                    self.osc_overflow = true;
                }
            }
        }
    }

    fn osc_escape<F: FnMut(Action)>(&mut self, byte: u8, emit: &mut F) {
        if byte == b'\\' {
            self.dispatch_osc(emit);
        } else {
            // Interrupted by a new escape sequence; the partial string is lost
            self.osc.clear();
            self.osc_overflow = false;
            self.enter_escape();
            self.escape(byte, emit);
        }
    }

    fn dispatch_osc<F: FnMut(Action)>(&mut self, emit: &mut F) {
        let payload = std::mem::take(&mut self.osc);
        let overflow = std::mem::replace(&mut self.osc_overflow, false);
        self.state = ParserState::Ground;
        if overflow {
            tracing::trace!(len = payload.len(), "discarding oversized OSC");
            return;
        }
        emit(Action::Osc(payload));
    }
}
