// qcommon.rs — definitions shared by every part of the protocol decoder

// ============================================================
// SizeBuf — fixed-capacity message buffer
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct SizeBuf {
    pub allow_overflow: bool,
    pub overflowed: bool,
    pub data: Vec<u8>,
    pub maxsize: i32,
    pub cursize: i32,
    pub readcount: i32,
}

impl SizeBuf {
    pub fn new(maxsize: i32) -> Self {
        Self {
            allow_overflow: false,
            overflowed: false,
            data: vec![0u8; maxsize as usize],
            maxsize,
            cursize: 0,
            readcount: 0,
        }
    }

    /// Wrap a received message for reading. The declared size is the
    /// length of `bytes`.
    pub fn from_message(bytes: &[u8]) -> Self {
        Self {
            allow_overflow: false,
            overflowed: false,
            data: bytes.to_vec(),
            maxsize: bytes.len() as i32,
            cursize: bytes.len() as i32,
            readcount: 0,
        }
    }

    pub fn clear(&mut self) {
        self.cursize = 0;
        self.overflowed = false;
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.cursize as usize]
    }

    pub fn remaining(&self) -> i32 {
        (self.cursize - self.readcount).max(0)
    }
}

// ============================================================
// Protocol
// ============================================================

pub const PROTOCOL_DEMO_VERSION: i32 = 25;
pub const PROTOCOL_RELEASE_VERSION: i32 = 26;
pub const PROTOCOL_XATRIX_VERSION: i32 = 32;
pub const PROTOCOL_R97_VERSION: i32 = 34;
pub const PROTOCOL_RR22_VERSION: i32 = 2022;
pub const PROTOCOL_RR23_VERSION: i32 = 2023;
/// The protocol this client speaks natively.
pub const PROTOCOL_VERSION: i32 = 2024;

/// True for every protocol of the original 1997 family.
pub fn is_qii97_protocol(protocol: i32) -> bool {
    protocol <= PROTOCOL_R97_VERSION
}

/// Wire-format family a protocol version belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// 1997 family: byte model indices, 1/8 unit coordinates.
    Legacy,
    /// Rerelease demo and network protocols: short model indices, float
    /// coordinates, no extended effects.
    Rerelease,
    /// Native protocol: rerelease plus extended effects and entity scale.
    Current,
}

impl Dialect {
    pub fn from_protocol(protocol: i32) -> Self {
        if is_qii97_protocol(protocol) {
            Dialect::Legacy
        } else if protocol == PROTOCOL_VERSION {
            Dialect::Current
        } else {
            Dialect::Rerelease
        }
    }
}

/// Whether this client can decode a stream of the given version.
pub fn protocol_supported(protocol: i32) -> bool {
    matches!(
        protocol,
        PROTOCOL_DEMO_VERSION
            | PROTOCOL_RELEASE_VERSION
            | PROTOCOL_XATRIX_VERSION
            | PROTOCOL_R97_VERSION
            | PROTOCOL_RR22_VERSION
            | PROTOCOL_RR23_VERSION
            | PROTOCOL_VERSION
    )
}

pub fn protocol_name(protocol: i32) -> &'static str {
    match protocol {
        PROTOCOL_RELEASE_VERSION => "Quake 2 Demo",
        PROTOCOL_XATRIX_VERSION => "Quake 2 Xatrix Demo",
        PROTOCOL_DEMO_VERSION => "Quake 2 Release Demo",
        PROTOCOL_R97_VERSION => "Quake 2",
        PROTOCOL_RR22_VERSION => "ReRelease Quake 2 Demo",
        PROTOCOL_RR23_VERSION => "ReRelease Quake 2",
        PROTOCOL_VERSION => "ReRelease Quake 2 Custom version",
        _ => "Unknown protocol version",
    }
}

pub const MAX_MSGLEN: usize = 0x8000;

pub const UPDATE_BACKUP: i32 = 16;
pub const UPDATE_MASK: i32 = UPDATE_BACKUP - 1;

// ============================================================
// Server-to-client ops
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SvcOps {
    Bad = 0,
    MuzzleFlash,
    MuzzleFlash2,
    TempEntity,
    Layout,
    Inventory,
    Nop,
    Disconnect,
    Reconnect,
    Sound,
    Print,
    StuffText,
    ServerData,
    ConfigString,
    SpawnBaseline,
    CenterPrint,
    Download,
    PlayerInfo,
    PacketEntities,
    DeltaPacketEntities,
    Frame,
}

impl SvcOps {
    pub fn from_i32(cmd: i32) -> Option<Self> {
        use SvcOps::*;
        const OPS: [SvcOps; 21] = [
            Bad, MuzzleFlash, MuzzleFlash2, TempEntity, Layout, Inventory, Nop,
            Disconnect, Reconnect, Sound, Print, StuffText, ServerData,
            ConfigString, SpawnBaseline, CenterPrint, Download, PlayerInfo,
            PacketEntities, DeltaPacketEntities, Frame,
        ];
        usize::try_from(cmd).ok().and_then(|i| OPS.get(i).copied())
    }
}

pub const SVC_BAD: i32 = 0;
pub const SVC_MUZZLEFLASH: i32 = 1;
pub const SVC_MUZZLEFLASH2: i32 = 2;
pub const SVC_TEMP_ENTITY: i32 = 3;
pub const SVC_LAYOUT: i32 = 4;
pub const SVC_INVENTORY: i32 = 5;
pub const SVC_NOP: i32 = 6;
pub const SVC_DISCONNECT: i32 = 7;
pub const SVC_RECONNECT: i32 = 8;
pub const SVC_SOUND: i32 = 9;
pub const SVC_PRINT: i32 = 10;
pub const SVC_STUFFTEXT: i32 = 11;
pub const SVC_SERVERDATA: i32 = 12;
pub const SVC_CONFIGSTRING: i32 = 13;
pub const SVC_SPAWNBASELINE: i32 = 14;
pub const SVC_CENTERPRINT: i32 = 15;
pub const SVC_DOWNLOAD: i32 = 16;
pub const SVC_PLAYERINFO: i32 = 17;
pub const SVC_PACKETENTITIES: i32 = 18;
pub const SVC_DELTAPACKETENTITIES: i32 = 19;
pub const SVC_FRAME: i32 = 20;

// ============================================================
// Player state communication flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PlayerStateBits: u32 {
        const M_TYPE         = 1 << 0;
        const M_ORIGIN       = 1 << 1;
        const M_VELOCITY     = 1 << 2;
        const M_TIME         = 1 << 3;
        const M_FLAGS        = 1 << 4;
        const M_GRAVITY      = 1 << 5;
        const M_DELTA_ANGLES = 1 << 6;
        const VIEWOFFSET     = 1 << 7;
        const VIEWANGLES     = 1 << 8;
        const KICKANGLES     = 1 << 9;
        const BLEND          = 1 << 10;
        const FOV            = 1 << 11;
        const WEAPONINDEX    = 1 << 12;
        const WEAPONFRAME    = 1 << 13;
        const RDFLAGS        = 1 << 14;
    }
}
pub const PS_M_TYPE: PlayerStateBits = PlayerStateBits::M_TYPE;
pub const PS_M_ORIGIN: PlayerStateBits = PlayerStateBits::M_ORIGIN;
pub const PS_M_VELOCITY: PlayerStateBits = PlayerStateBits::M_VELOCITY;
pub const PS_M_TIME: PlayerStateBits = PlayerStateBits::M_TIME;
pub const PS_M_FLAGS: PlayerStateBits = PlayerStateBits::M_FLAGS;
pub const PS_M_GRAVITY: PlayerStateBits = PlayerStateBits::M_GRAVITY;
pub const PS_M_DELTA_ANGLES: PlayerStateBits = PlayerStateBits::M_DELTA_ANGLES;
pub const PS_VIEWOFFSET: PlayerStateBits = PlayerStateBits::VIEWOFFSET;
pub const PS_VIEWANGLES: PlayerStateBits = PlayerStateBits::VIEWANGLES;
pub const PS_KICKANGLES: PlayerStateBits = PlayerStateBits::KICKANGLES;
pub const PS_BLEND: PlayerStateBits = PlayerStateBits::BLEND;
pub const PS_FOV: PlayerStateBits = PlayerStateBits::FOV;
pub const PS_WEAPONINDEX: PlayerStateBits = PlayerStateBits::WEAPONINDEX;
pub const PS_WEAPONFRAME: PlayerStateBits = PlayerStateBits::WEAPONFRAME;
pub const PS_RDFLAGS: PlayerStateBits = PlayerStateBits::RDFLAGS;

// ============================================================
// Sound flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SoundFlags: u32 {
        const VOLUME      = 1 << 0;
        const ATTENUATION = 1 << 1;
        const POS         = 1 << 2; // three coordinates
        const ENT         = 1 << 3; // short 0-2: channel, 3-12: entity
        const OFFSET      = 1 << 4; // byte, msec offset from frame start
    }
}
pub const SND_VOLUME: SoundFlags = SoundFlags::VOLUME;
pub const SND_ATTENUATION: SoundFlags = SoundFlags::ATTENUATION;
pub const SND_POS: SoundFlags = SoundFlags::POS;
pub const SND_ENT: SoundFlags = SoundFlags::ENT;
pub const SND_OFFSET: SoundFlags = SoundFlags::OFFSET;

pub const DEFAULT_SOUND_PACKET_VOLUME: f32 = 1.0;
pub const DEFAULT_SOUND_PACKET_ATTENUATION: f32 = 1.0;

// ============================================================
// Entity state communication flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UpdateBits: u32 {
        // first byte
        const ORIGIN1    = 1 << 0;
        const ORIGIN2    = 1 << 1;
        const ANGLE2     = 1 << 2;
        const ANGLE3     = 1 << 3;
        const FRAME8     = 1 << 4; // frame is a byte
        const EVENT      = 1 << 5;
        const REMOVE     = 1 << 6; // REMOVE this entity, don't add it
        const MOREBITS1  = 1 << 7; // read one additional byte

        // second byte
        const NUMBER16   = 1 << 8; // NUMBER8 is implicit if not set
        const ORIGIN3    = 1 << 9;
        const ANGLE1     = 1 << 10;
        const MODEL      = 1 << 11;
        const RENDERFX8  = 1 << 12; // fullbright, etc
        const EFFECTS8   = 1 << 14; // autorotate, trails, etc
        const MOREBITS2  = 1 << 15; // read one additional byte

        // third byte
        const SKIN8      = 1 << 16;
        const FRAME16    = 1 << 17; // frame is a short
        const RENDERFX16 = 1 << 18; // 8 + 16 = 32
        const EFFECTS16  = 1 << 19; // 8 + 16 = 32
        const MODEL2     = 1 << 20; // weapons, flags, etc
        const MODEL3     = 1 << 21;
        const MODEL4     = 1 << 22;
        const MOREBITS3  = 1 << 23; // read one additional byte

        // fourth byte
        const OLDORIGIN  = 1 << 24;
        const SKIN16     = 1 << 25;
        const SOUND      = 1 << 26;
        const SOLID      = 1 << 27;
    }
}
pub const U_ORIGIN1: UpdateBits = UpdateBits::ORIGIN1;
pub const U_ORIGIN2: UpdateBits = UpdateBits::ORIGIN2;
pub const U_ANGLE2: UpdateBits = UpdateBits::ANGLE2;
pub const U_ANGLE3: UpdateBits = UpdateBits::ANGLE3;
pub const U_FRAME8: UpdateBits = UpdateBits::FRAME8;
pub const U_EVENT: UpdateBits = UpdateBits::EVENT;
pub const U_REMOVE: UpdateBits = UpdateBits::REMOVE;
pub const U_MOREBITS1: UpdateBits = UpdateBits::MOREBITS1;
pub const U_NUMBER16: UpdateBits = UpdateBits::NUMBER16;
pub const U_ORIGIN3: UpdateBits = UpdateBits::ORIGIN3;
pub const U_ANGLE1: UpdateBits = UpdateBits::ANGLE1;
pub const U_MODEL: UpdateBits = UpdateBits::MODEL;
pub const U_RENDERFX8: UpdateBits = UpdateBits::RENDERFX8;
pub const U_EFFECTS8: UpdateBits = UpdateBits::EFFECTS8;
pub const U_MOREBITS2: UpdateBits = UpdateBits::MOREBITS2;
pub const U_SKIN8: UpdateBits = UpdateBits::SKIN8;
pub const U_FRAME16: UpdateBits = UpdateBits::FRAME16;
pub const U_RENDERFX16: UpdateBits = UpdateBits::RENDERFX16;
pub const U_EFFECTS16: UpdateBits = UpdateBits::EFFECTS16;
pub const U_MODEL2: UpdateBits = UpdateBits::MODEL2;
pub const U_MODEL3: UpdateBits = UpdateBits::MODEL3;
pub const U_MODEL4: UpdateBits = UpdateBits::MODEL4;
pub const U_MOREBITS3: UpdateBits = UpdateBits::MOREBITS3;
pub const U_OLDORIGIN: UpdateBits = UpdateBits::OLDORIGIN;
pub const U_SKIN16: UpdateBits = UpdateBits::SKIN16;
pub const U_SOUND: UpdateBits = UpdateBits::SOUND;
pub const U_SOLID: UpdateBits = UpdateBits::SOLID;
