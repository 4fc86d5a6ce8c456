use alloc::boxed::Box;

use crate::name::Name;
use crate::tlv::{Decoder, TlvError, TLV_DATA, TLV_INTEREST};

/// Cost installed with FIB entries registered through the direct face.
pub const DEFAULT_FIB_COST: u8 = 0;
/// Default callback-table capacity.
pub const DEFAULT_CB_TABLE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceError {
    /// No callback-table entry matched the delivered packet's name.
    NoMatchedCallback,
    /// Every callback slot is taken.
    CallbackTableFull,
    /// The forwarder handed over a packet with an empty name.
    InvalidName,
    /// The face is not up.
    FaceDown,
    /// The forwarder refused the injected packet or FIB entry.
    ForwarderRejected,
    Tlv(TlvError),
}

impl From<TlvError> for FaceError {
    fn from(err: TlvError) -> Self {
        FaceError::Tlv(err)
    }
}

/// The forwarder operations the direct face consumes. The forwarder
/// itself (FIB and PIT included) lives outside this crate.
pub trait Forwarder {
    /// Pushes an outbound packet from the given face into the forwarder.
    fn receive(&mut self, face_id: u32, packet: &[u8]) -> Result<(), FaceError>;

    /// Installs a prefix route toward the given face.
    fn fib_insert(&mut self, prefix: &Name, face_id: u32, cost: u8) -> Result<(), FaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Destroyed,
    Down,
    Up,
}

type PacketCallback = Box<dyn FnMut(&[u8])>;
type TimeoutCallback = Box<dyn FnMut(&Name)>;

struct CallbackSlot {
    name: Name,
    is_prefix: bool,
    on_data: Option<PacketCallback>,
    on_timeout: Option<TimeoutCallback>,
    on_interest: Option<PacketCallback>,
}

/// The in-process, application-facing face.
///
/// The forwarder delivers packets through [`DirectFace::send`] together
/// with their already-decoded top-level name; the face routes them to the
/// first matching callback in registration order. Entries are not freed on
/// Data delivery; the application reclaims them via [`DirectFace::release`]
/// or they are freed when a timeout fires.
///
/// A forwarder should attach at most one direct face; everything here is
/// single-threaded and runs to completion on the caller's thread.
pub struct DirectFace<const SLOTS: usize = DEFAULT_CB_TABLE_SIZE> {
    face_id: u32,
    state: FaceState,
    slots: [Option<CallbackSlot>; SLOTS],
}

impl<const SLOTS: usize> DirectFace<SLOTS> {
    pub fn new(face_id: u32) -> Self {
        Self {
            face_id,
            state: FaceState::Down,
            slots: core::array::from_fn(|_| None),
        }
    }

    pub fn face_id(&self) -> u32 {
        self.face_id
    }

    pub fn state(&self) -> FaceState {
        self.state
    }

    pub fn up(&mut self) {
        self.state = FaceState::Up;
    }

    pub fn down(&mut self) {
        self.state = FaceState::Down;
    }

    /// Tears the face down and resets every callback slot.
    pub fn destroy(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.state = FaceState::Destroyed;
    }

    /// Registers callbacks for one expressed Interest and injects its
    /// encoded bytes into the forwarder.
    pub fn express_interest<F: Forwarder>(
        &mut self,
        forwarder: &mut F,
        name: &Name,
        interest: &[u8],
        on_data: impl FnMut(&[u8]) + 'static,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<(), FaceError> {
        if self.state != FaceState::Up {
            return Err(FaceError::FaceDown);
        }
        let slot = self.free_slot()?;
        *slot = Some(CallbackSlot {
            name: *name,
            is_prefix: false,
            on_data: Some(Box::new(on_data)),
            on_timeout,
            on_interest: None,
        });
        forwarder.receive(self.face_id, interest)
    }

    /// Registers an Interest handler for a prefix and installs the
    /// matching FIB entry in the forwarder.
    pub fn register_prefix<F: Forwarder>(
        &mut self,
        forwarder: &mut F,
        prefix: &Name,
        on_interest: impl FnMut(&[u8]) + 'static,
    ) -> Result<(), FaceError> {
        if self.state != FaceState::Up {
            return Err(FaceError::FaceDown);
        }
        let slot = self.free_slot()?;
        *slot = Some(CallbackSlot {
            name: *prefix,
            is_prefix: true,
            on_data: None,
            on_timeout: None,
            on_interest: Some(Box::new(on_interest)),
        });
        forwarder.fib_insert(prefix, self.face_id, DEFAULT_FIB_COST)
    }

    /// Called by the forwarder to deliver a packet upward. `name` is the
    /// packet's top-level name, which the forwarder has already decoded.
    ///
    /// Data packets dispatch on the first exact-name entry, Interests on
    /// the first registered prefix of the name. This face carries whole
    /// packets only; any type other than Interest or Data is rejected.
    pub fn send(&mut self, name: &Name, packet: &[u8]) -> Result<(), FaceError> {
        if self.state != FaceState::Up {
            return Err(FaceError::FaceDown);
        }
        if name.is_empty() {
            return Err(FaceError::InvalidName);
        }
        let is_interest = match Decoder::new(packet).peek_type()? {
            TLV_INTEREST => true,
            TLV_DATA => false,
            _ => return Err(FaceError::Tlv(TlvError::WrongType)),
        };

        for slot in self.slots.iter_mut().flatten() {
            let matched = if is_interest {
                slot.is_prefix && slot.name.is_prefix_of(name)
            } else {
                !slot.is_prefix && slot.name == *name
            };
            if !matched {
                continue;
            }
            let callback = if is_interest {
                slot.on_interest.as_mut()
            } else {
                slot.on_data.as_mut()
            };
            if let Some(callback) = callback {
                callback(packet);
            }
            return Ok(());
        }
        Err(FaceError::NoMatchedCallback)
    }

    /// Signals PIT expiry for an expressed Interest: fires `on_timeout` on
    /// the first exact-name entry and frees its slot.
    pub fn notify_timeout(&mut self, name: &Name) -> Result<(), FaceError> {
        for slot in self.slots.iter_mut() {
            let matched = match slot {
                Some(entry) => !entry.is_prefix && entry.name == *name,
                None => false,
            };
            if !matched {
                continue;
            }
            if let Some(mut entry) = slot.take() {
                if let Some(on_timeout) = entry.on_timeout.as_mut() {
                    on_timeout(name);
                }
            }
            return Ok(());
        }
        Err(FaceError::NoMatchedCallback)
    }

    /// Frees the first slot registered under exactly `name`. Returns true
    /// if a slot was reclaimed.
    pub fn release(&mut self, name: &Name) -> bool {
        for slot in self.slots.iter_mut() {
            let matched = match slot {
                Some(entry) => entry.name == *name,
                None => false,
            };
            if matched {
                *slot = None;
                return true;
            }
        }
        false
    }

    fn free_slot(&mut self) -> Result<&mut Option<CallbackSlot>, FaceError> {
        self.slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(FaceError::CallbackTableFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use crate::tlv::Encoder;

    #[derive(Default)]
    struct MockForwarder {
        received: Vec<(u32, Vec<u8>)>,
        fib: Vec<(Name, u32, u8)>,
    }

    impl Forwarder for MockForwarder {
        fn receive(&mut self, face_id: u32, packet: &[u8]) -> Result<(), FaceError> {
            self.received.push((face_id, packet.to_vec()));
            Ok(())
        }

        fn fib_insert(&mut self, prefix: &Name, face_id: u32, cost: u8) -> Result<(), FaceError> {
            self.fib.push((*prefix, face_id, cost));
            Ok(())
        }
    }

    fn packet(typ: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let mut enc = Encoder::new(&mut buf);
        enc.put_block(typ, payload).unwrap();
        enc.written().to_vec()
    }

    fn face() -> DirectFace<DEFAULT_CB_TABLE_SIZE> {
        let mut face = DirectFace::new(1);
        face.up();
        face
    }

    #[test]
    fn test_exact_data_dispatch() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();
        let fired = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&fired);
        let name = Name::from_string("/a/b").unwrap();
        face.express_interest(
            &mut forwarder,
            &name,
            &packet(TLV_INTEREST, b""),
            move |_| counter.set(counter.get() + 1),
            None,
        )
        .unwrap();

        face.send(&name, &packet(TLV_DATA, b"payload")).unwrap();
        assert_eq!(fired.get(), 1);

        // A different name does not dispatch, nor does a longer one.
        let other = Name::from_string("/a/c").unwrap();
        assert_eq!(
            face.send(&other, &packet(TLV_DATA, b"")),
            Err(FaceError::NoMatchedCallback)
        );
        let longer = Name::from_string("/a/b/c").unwrap();
        assert_eq!(
            face.send(&longer, &packet(TLV_DATA, b"")),
            Err(FaceError::NoMatchedCallback)
        );
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_prefix_interest_dispatch() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let prefix = Name::from_string("/svc").unwrap();
        face.register_prefix(&mut forwarder, &prefix, move |bytes| {
            sink.borrow_mut().extend_from_slice(bytes)
        })
        .unwrap();

        // The callback receives the full encoded packet.
        let interest = packet(TLV_INTEREST, b"op1");
        let name = Name::from_string("/svc/op/1").unwrap();
        face.send(&name, &interest).unwrap();
        assert_eq!(*seen.borrow(), interest);

        let unrelated = Name::from_string("/y").unwrap();
        assert_eq!(
            face.send(&unrelated, &packet(TLV_INTEREST, b"")),
            Err(FaceError::NoMatchedCallback)
        );

        // A Data packet never matches a prefix entry.
        assert_eq!(
            face.send(&name, &packet(TLV_DATA, b"")),
            Err(FaceError::NoMatchedCallback)
        );
    }

    #[test]
    fn test_first_match_wins() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();
        let first = Rc::new(Cell::new(0u32));
        let second = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&first);
        face.register_prefix(&mut forwarder, &Name::from_string("/a").unwrap(), move |_| {
            counter.set(counter.get() + 1)
        })
        .unwrap();
        let counter = Rc::clone(&second);
        face.register_prefix(
            &mut forwarder,
            &Name::from_string("/a/b").unwrap(),
            move |_| counter.set(counter.get() + 1),
        )
        .unwrap();

        // Both prefixes match; registration order decides.
        let name = Name::from_string("/a/b/c").unwrap();
        face.send(&name, &packet(TLV_INTEREST, b"")).unwrap();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn test_table_full() {
        let mut forwarder = MockForwarder::default();
        let mut face: DirectFace<2> = DirectFace::new(1);
        face.up();

        for i in 0..2u8 {
            let mut name = Name::from_string("/p").unwrap();
            name.push(crate::name::NameComponent::generic(&[i]).unwrap())
                .unwrap();
            face.register_prefix(&mut forwarder, &name, |_| {}).unwrap();
        }
        assert_eq!(
            face.register_prefix(&mut forwarder, &Name::from_string("/q").unwrap(), |_| {}),
            Err(FaceError::CallbackTableFull)
        );

        // Destroying resets the table.
        face.destroy();
        assert_eq!(face.state(), FaceState::Destroyed);
        face.up();
        face.register_prefix(&mut forwarder, &Name::from_string("/q").unwrap(), |_| {})
            .unwrap();
    }

    #[test]
    fn test_forwarder_interactions() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();

        let name = Name::from_string("/a").unwrap();
        let interest = packet(TLV_INTEREST, b"n");
        face.express_interest(&mut forwarder, &name, &interest, |_| {}, None)
            .unwrap();
        assert_eq!(forwarder.received, [(1, interest)]);

        let prefix = Name::from_string("/svc").unwrap();
        face.register_prefix(&mut forwarder, &prefix, |_| {}).unwrap();
        assert_eq!(forwarder.fib, [(prefix, 1, DEFAULT_FIB_COST)]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut face = face();
        let name = Name::from_string("/a").unwrap();

        // Only whole Interest or Data packets cross this face.
        assert_eq!(
            face.send(&name, &packet(80, b"")),
            Err(FaceError::Tlv(TlvError::WrongType))
        );
        assert_eq!(
            face.send(&Name::new(), &packet(TLV_DATA, b"")),
            Err(FaceError::InvalidName)
        );

        face.down();
        assert_eq!(
            face.send(&name, &packet(TLV_DATA, b"")),
            Err(FaceError::FaceDown)
        );
    }

    #[test]
    fn test_timeout_frees_slot() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();
        let timed_out = Rc::new(Cell::new(false));

        let flag = Rc::clone(&timed_out);
        let name = Name::from_string("/a").unwrap();
        face.express_interest(
            &mut forwarder,
            &name,
            &packet(TLV_INTEREST, b""),
            |_| {},
            Some(Box::new(move |_| flag.set(true))),
        )
        .unwrap();

        face.notify_timeout(&name).unwrap();
        assert!(timed_out.get());

        // The slot is gone: neither delivery nor a second timeout matches.
        assert_eq!(
            face.send(&name, &packet(TLV_DATA, b"")),
            Err(FaceError::NoMatchedCallback)
        );
        assert_eq!(face.notify_timeout(&name), Err(FaceError::NoMatchedCallback));
    }

    #[test]
    fn test_release() {
        let mut forwarder = MockForwarder::default();
        let mut face = face();
        let name = Name::from_string("/a").unwrap();
        face.express_interest(&mut forwarder, &name, &packet(TLV_INTEREST, b""), |_| {}, None)
            .unwrap();

        assert!(face.release(&name));
        assert!(!face.release(&name));
        assert_eq!(
            face.send(&name, &packet(TLV_DATA, b"")),
            Err(FaceError::NoMatchedCallback)
        );
    }
}
