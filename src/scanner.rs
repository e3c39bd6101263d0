//! The signature grammar, as a single frame-stack traversal.
//!
//! Both validation and iteration drive the same [`Scan`]: each call consumes exactly one
//! single complete type and returns where it ends. Nesting is tracked on an explicit stack,
//! so deeply nested input is bounded by the configured limits rather than by the call stack.

use log::{error, trace};

use crate::err::{GrammarError, GrammarResult, NestingKind};
use crate::settings::SignatureSettings;
use crate::type_code::TypeCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// Waiting for its single element type.
    Array,
    Struct,
    DictEntry,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    opened_at: usize,
    /// Number of complete types seen inside a struct or dict-entry.
    count: usize,
}

/// Where the scanned sequence sits in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanContext {
    TopLevel,
    /// The interior of an array, where a dict-entry may appear without an enclosing `a`.
    ArrayElement,
}

#[derive(Debug, Clone)]
pub(crate) struct Scan {
    frames: Vec<Frame>,
    context: ScanContext,
    container_depth: u32,
    dict_entry_depth: u32,
    max_container_depth: u32,
    max_dict_entry_depth: u32,
}

impl Scan {
    pub(crate) fn new(settings: &SignatureSettings, context: ScanContext) -> Self {
        Scan {
            frames: Vec::new(),
            context,
            container_depth: 0,
            dict_entry_depth: 0,
            max_container_depth: settings.get_max_container_depth(),
            max_dict_entry_depth: settings.get_max_dict_entry_depth(),
        }
    }

    /// A scan over input that was already validated; depth limits were enforced then.
    pub(crate) fn unbounded(context: ScanContext) -> Self {
        Scan {
            frames: Vec::new(),
            context,
            container_depth: 0,
            dict_entry_depth: 0,
            max_container_depth: u32::MAX,
            max_dict_entry_depth: u32::MAX,
        }
    }

    /// Consumes one single complete type starting at `start`.
    ///
    /// Returns the offset one past its last byte, or `None` when `start` is at the end of `buf`.
    pub(crate) fn next_end(&mut self, buf: &[u8], start: usize) -> GrammarResult<Option<usize>> {
        if start >= buf.len() {
            return Ok(None);
        }

        self.frames.clear();
        self.container_depth = 0;
        self.dict_entry_depth = 0;

        let mut pos = start;
        loop {
            let Some(&byte) = buf.get(pos) else {
                return Err(self.unclosed());
            };
            let offset = pos;
            pos += 1;

            let completed = match byte {
                b'a' => {
                    self.check_slot(offset, false)?;
                    self.push(FrameKind::Array, offset)?;
                    false
                }
                b'(' => {
                    self.check_slot(offset, false)?;
                    self.push(FrameKind::Struct, offset)?;
                    false
                }
                b'{' => {
                    if !self.awaiting_array_element() {
                        return Err(GrammarError::DictEntryOutsideArray { offset });
                    }
                    self.push(FrameKind::DictEntry, offset)?;
                    false
                }
                b')' => {
                    self.close(FrameKind::Struct, byte, offset)?;
                    true
                }
                b'}' => {
                    self.close(FrameKind::DictEntry, byte, offset)?;
                    true
                }
                _ => {
                    let code = TypeCode::from_u8(byte)
                        .ok_or(GrammarError::UnknownTypeCode { code: byte, offset })?;
                    self.check_slot(offset, code.is_basic())?;
                    true
                }
            };

            if completed && self.complete() {
                trace!("single complete type at {start}..{pos}");
                return Ok(Some(pos));
            }
        }
    }

    fn awaiting_array_element(&self) -> bool {
        match self.frames.last() {
            Some(frame) => frame.kind == FrameKind::Array,
            None => self.context == ScanContext::ArrayElement,
        }
    }

    /// Checks that a type starting at `offset` may occupy the next slot of the enclosing frame.
    fn check_slot(&self, offset: usize, basic: bool) -> GrammarResult<()> {
        match self.frames.last() {
            Some(Frame {
                kind: FrameKind::DictEntry,
                count,
                ..
            }) => {
                if *count == 0 && !basic {
                    return Err(GrammarError::InvalidDictKeyType { offset });
                }
                if *count >= 2 {
                    return Err(GrammarError::WrongDictEntryArity {
                        found: count + 1,
                        offset,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn push(&mut self, kind: FrameKind, offset: usize) -> GrammarResult<()> {
        match kind {
            FrameKind::Array | FrameKind::Struct => {
                if self.container_depth >= self.max_container_depth {
                    return Err(GrammarError::NestingTooDeep {
                        kind: NestingKind::ArrayOrStruct,
                        limit: self.max_container_depth,
                        offset,
                    });
                }
                self.container_depth += 1;
            }
            FrameKind::DictEntry => {
                if self.dict_entry_depth >= self.max_dict_entry_depth {
                    return Err(GrammarError::NestingTooDeep {
                        kind: NestingKind::DictEntry,
                        limit: self.max_dict_entry_depth,
                        offset,
                    });
                }
                self.dict_entry_depth += 1;
            }
        }

        trace!("offset {offset}: open {kind:?} (depth {})", self.frames.len() + 1);
        self.frames.push(Frame {
            kind,
            opened_at: offset,
            count: 0,
        });
        Ok(())
    }

    fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        match frame.kind {
            FrameKind::Array | FrameKind::Struct => self.container_depth -= 1,
            FrameKind::DictEntry => self.dict_entry_depth -= 1,
        }
        Some(frame)
    }

    fn close(&mut self, kind: FrameKind, bracket: u8, offset: usize) -> GrammarResult<()> {
        let top = match self.frames.last() {
            Some(frame) if frame.kind == FrameKind::Array => {
                return Err(GrammarError::DanglingArrayMarker {
                    offset: frame.opened_at,
                });
            }
            Some(frame) if frame.kind == kind => *frame,
            _ => return Err(GrammarError::UnbalancedCloseBracket { bracket, offset }),
        };

        match (kind, top.count) {
            (FrameKind::Struct, 0) => return Err(GrammarError::EmptyStruct { offset }),
            (FrameKind::DictEntry, 0) => return Err(GrammarError::InvalidDictKeyType { offset }),
            (FrameKind::DictEntry, found) if found != 2 => {
                return Err(GrammarError::WrongDictEntryArity { found, offset });
            }
            _ => {}
        }

        trace!("offset {offset}: close {kind:?} opened at {}", top.opened_at);
        self.pop();
        Ok(())
    }

    /// Records a completed type in the enclosing frame.
    ///
    /// A completed element also completes every array waiting on it, so satisfied array frames
    /// are popped until a struct or dict-entry absorbs the type. Returns `true` once the stack
    /// is empty, i.e. a whole single complete type has been consumed.
    fn complete(&mut self) -> bool {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return true;
            };
            if frame.kind != FrameKind::Array {
                frame.count += 1;
                return false;
            }
            self.pop();
        }
    }

    fn unclosed(&self) -> GrammarError {
        match self.frames.last() {
            Some(frame) if frame.kind == FrameKind::Array => GrammarError::DanglingArrayMarker {
                offset: frame.opened_at,
            },
            Some(frame) => GrammarError::UnterminatedContainer {
                offset: frame.opened_at,
            },
            // `next_end` only runs off the end with at least one frame open.
            None => GrammarError::UnterminatedContainer { offset: 0 },
        }
    }
}

/// Byte range and leading type code of one single complete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) code: TypeCode,
}

/// Resumable position over already-validated input.
///
/// Once it reaches the end it stays exhausted.
#[derive(Debug, Clone)]
pub(crate) struct TypeCursor {
    scan: Scan,
    pos: usize,
    exhausted: bool,
}

impl TypeCursor {
    pub(crate) fn new(context: ScanContext) -> Self {
        TypeCursor {
            scan: Scan::unbounded(context),
            pos: 0,
            exhausted: false,
        }
    }

    pub(crate) fn exhausted() -> Self {
        TypeCursor {
            scan: Scan::unbounded(ScanContext::TopLevel),
            pos: 0,
            exhausted: true,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn step(&mut self, buf: &[u8]) -> Option<Span> {
        if self.exhausted {
            return None;
        }

        let start = self.pos;
        let end = match self.scan.next_end(buf, start) {
            Ok(Some(end)) => end,
            Ok(None) => {
                trace!("cursor exhausted at offset {start}");
                self.exhausted = true;
                return None;
            }
            Err(e) => {
                // Cursors only run over validated text, so any error here is a traversal bug.
                error!("grammar error while iterating validated signature: {e}");
                debug_assert!(false, "grammar error while iterating validated signature: {e}");
                self.exhausted = true;
                return None;
            }
        };

        let code = buf.get(start).copied().and_then(TypeCode::from_u8)?;
        self.pos = end;
        if end >= buf.len() {
            self.exhausted = true;
        }
        Some(Span { start, end, code })
    }
}
