//! Traits and impls used to read/write typed data to/from the chip registers.

use core::{
	marker::PhantomData,
	fmt,
	};
use bilge::prelude::*;
use crate::registers::MAX_REG;


/**
	trait for data types that can be packed/unpacked to/from a one-byte register
*/
pub trait RegisterData: Sized + Copy {
    fn pack(self) -> u8;
    fn unpack(src: u8) -> Self;
}

impl RegisterData for u8 {
    fn pack(self) -> u8 {self}
    fn unpack(src: u8) -> Self {src}
}

/// macro implementing [RegisterData] for a given struct generated with `bilge`
macro_rules! bilge_register {
    ($t: ty) => { impl crate::data::RegisterData for $t {
        fn pack(self) -> u8 {u8::from(self)}
        fn unpack(src: u8) -> Self {Self::from(src)}
    }};
}
pub(crate) use bilge_register;


/// one of the two independent IO-Link ports of the chip
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Channel {
    A = 0,
    B = 1,
}
impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// index of the channel in per-channel tables
    pub fn index(self) -> usize {self as usize}
    /// address offset of the channel register in a register pair
    pub fn offset(self) -> u8 {self as u8}
}
impl fmt::Display for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
	}
}


/**
	locate a register by its address, its content must be extracted to type `T` to be processed in rust

	It acts like a pointer to the register that also knows how to decode its content.
*/
pub struct Register<T: RegisterData> {
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
	/// register address on the chip
	pub address: u8,
}
impl<T: RegisterData> Register<T> {
	pub const fn new(address: u8) -> Self {
        assert!(address <= MAX_REG, "register address out of the register map");
		Self{extracted: PhantomData, address}
	}
}
impl<T: RegisterData> fmt::Debug for Register<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Register{{0x{:02x}}}", self.address)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying a register pointing to a type which does not implement this operation
impl<T: RegisterData> Clone for Register<T> {
    fn clone(&self) -> Self   {Self::new(self.address)}
}
impl<T: RegisterData> Copy for Register<T> {}
impl<T: RegisterData> Eq for Register<T> {}
impl<T: RegisterData> PartialEq for Register<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

/**
    a register existing once per channel, the channel B register directly follows the channel A register
*/
pub struct RegisterPair<T: RegisterData> {
	extracted: PhantomData<T>,
	/// address of the channel A register
	pub address: u8,
}
impl<T: RegisterData> RegisterPair<T> {
	pub const fn new(address: u8) -> Self {
        assert!(address < MAX_REG, "register pair out of the register map");
		Self{extracted: PhantomData, address}
	}
	/// the register of the given channel
	pub const fn of(&self, channel: Channel) -> Register<T> {
        Register::new(self.address + channel as u8)
	}
}
impl<T: RegisterData> fmt::Debug for RegisterPair<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RegisterPair{{0x{:02x}, 0x{:02x}}}", self.address, self.address+1)
	}
}
impl<T: RegisterData> Clone for RegisterPair<T> {
    fn clone(&self) -> Self   {Self::new(self.address)}
}
impl<T: RegisterData> Copy for RegisterPair<T> {}
impl<T: RegisterData> Eq for RegisterPair<T> {}
impl<T: RegisterData> PartialEq for RegisterPair<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}


/**
    first byte of every SPI transaction, selecting the chip on the bus, the register and the direction

    the second byte of the transaction is the register content, written by the master or answered by the chip
*/
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct Command {
    /// register address
    pub register: u5,
    /// chip address, set by the A0 A1 pins
    pub chip: u2,
    /// true for a read, false for a write
    pub read: bool,
}
bilge_register!(Command);

impl Command {
    /// command byte for the given access, `None` if the register does not exist
    pub fn encode(chip: u2, register: u8, read: bool) -> Option<u8> {
        if register > MAX_REG  {return None}
        Some(Self::new(u5::new(register), chip, read).pack())
    }
}
