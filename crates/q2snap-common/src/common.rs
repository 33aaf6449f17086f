// common.rs — console printing and message reading/writing

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::q_shared::{
    EntityState, PlayerState, Vec3, CUSTOM_PLAYER_MODEL, MAX_EDICTS, MAX_STATS,
    QII97_PLAYER_MODEL, RF_BEAM,
};
use crate::qcommon::{
    is_qii97_protocol, PlayerStateBits, SizeBuf, UpdateBits, PROTOCOL_VERSION,
    PS_BLEND, PS_FOV, PS_KICKANGLES, PS_M_DELTA_ANGLES, PS_M_FLAGS, PS_M_GRAVITY,
    PS_M_ORIGIN, PS_M_TIME, PS_M_TYPE, PS_M_VELOCITY, PS_RDFLAGS, PS_VIEWANGLES,
    PS_VIEWOFFSET, PS_WEAPONFRAME, PS_WEAPONINDEX,
    U_ANGLE1, U_ANGLE2, U_ANGLE3, U_EFFECTS16, U_EFFECTS8, U_EVENT, U_FRAME16, U_FRAME8,
    U_MODEL, U_MODEL2, U_MODEL3, U_MODEL4, U_MOREBITS1, U_MOREBITS2, U_MOREBITS3,
    U_NUMBER16, U_OLDORIGIN, U_ORIGIN1, U_ORIGIN2, U_ORIGIN3, U_RENDERFX16, U_RENDERFX8,
    U_SKIN16, U_SKIN8, U_SOLID, U_SOUND,
};

pub const MAXPRINTMSG: usize = 4096;

/// Size of the precomputed normal table direction bytes index into.
pub const NUMVERTEXNORMALS: usize = 162;

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);
static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Begin redirecting printf output into a buffer.
pub fn com_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

// ============================================================
// Com_Printf / Com_DPrintf
// ============================================================

/// General-purpose print function. Prints to stdout and appends to redirect
/// buffer if one is active.
pub fn com_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock();
        if let Some(ref mut s) = *buf {
            s.push_str(msg);
            return;
        }
    }
    print!("{}", msg);
}

/// Mirror of the "developer" cvar for code that has no cvar context.
pub fn com_set_developer(on: bool) {
    DEVELOPER.store(on, Ordering::Relaxed);
}

pub fn com_developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

/// Developer-only print.
pub fn com_dprintf(msg: &str) {
    if !com_developer() {
        return;
    }
    com_printf(msg);
}

// ============================================================
// Read errors
// ============================================================

/// The only way a primitive read can fail: the cursor would pass the
/// declared message size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgError {
    TruncatedMessage {
        readcount: i32,
        cursize: i32,
        wanted: i32,
    },
}

impl fmt::Display for MsgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgError::TruncatedMessage { readcount, cursize, wanted } => write!(
                f,
                "unexpected message end: {} byte(s) at offset {} of {}",
                wanted, readcount, cursize
            ),
        }
    }
}

impl std::error::Error for MsgError {}

pub type MsgResult<T> = Result<T, MsgError>;

// ============================================================
// SizeBuf operations
// ============================================================

impl SizeBuf {
    /// Get writable space in the buffer. Returns start offset of the space,
    /// or None when the buffer overflowed.
    pub fn get_space(&mut self, length: usize) -> Option<usize> {
        let cursize = self.cursize as usize;
        let maxsize = self.maxsize as usize;

        if cursize + length > maxsize {
            if !self.allow_overflow || length > maxsize {
                com_printf("SZ_GetSpace: overflow without allowoverflow set\n");
                self.overflowed = true;
                return None;
            }
            com_printf("SZ_GetSpace: overflow\n");
            self.clear();
            self.overflowed = true;
        }

        let start = self.cursize as usize;
        self.cursize += length as i32;
        Some(start)
    }

    /// Write raw bytes into the buffer.
    pub fn write(&mut self, src: &[u8]) {
        if let Some(start) = self.get_space(src.len()) {
            self.data[start..start + src.len()].copy_from_slice(src);
        }
    }

    /// Reserve `len` bytes starting at the read cursor.
    fn take(&mut self, len: i32) -> MsgResult<usize> {
        let rc = self.readcount;
        if len < 0 || rc + len > self.cursize {
            return Err(MsgError::TruncatedMessage {
                readcount: rc,
                cursize: self.cursize,
                wanted: len,
            });
        }
        self.readcount += len;
        Ok(rc as usize)
    }
}

// ============================================================
// MSG write functions
// ============================================================

pub fn msg_write_char(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(1) {
        sb.data[start] = c as u8;
    }
}

pub fn msg_write_byte(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(1) {
        sb.data[start] = c as u8;
    }
}

pub fn msg_write_short(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(2) {
        sb.data[start..start + 2].copy_from_slice(&(c as i16).to_le_bytes());
    }
}

pub fn msg_write_long(sb: &mut SizeBuf, c: i32) {
    if let Some(start) = sb.get_space(4) {
        sb.data[start..start + 4].copy_from_slice(&c.to_le_bytes());
    }
}

pub fn msg_write_float(sb: &mut SizeBuf, f: f32) {
    if let Some(start) = sb.get_space(4) {
        sb.data[start..start + 4].copy_from_slice(&f.to_le_bytes());
    }
}

pub fn msg_write_string(sb: &mut SizeBuf, s: &str) {
    let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
    sb.write(&bytes);
    sb.write(&[0]);
}

pub fn msg_write_coord(sb: &mut SizeBuf, f: f32, protocol: i32) {
    if is_qii97_protocol(protocol) {
        msg_write_short(sb, (f * 8.0) as i32);
    } else {
        msg_write_float(sb, f);
    }
}

pub fn msg_write_pos(sb: &mut SizeBuf, pos: &Vec3, protocol: i32) {
    msg_write_coord(sb, pos[0], protocol);
    msg_write_coord(sb, pos[1], protocol);
    msg_write_coord(sb, pos[2], protocol);
}

pub fn msg_write_angle(sb: &mut SizeBuf, f: f32) {
    msg_write_byte(sb, ((f * 256.0 / 360.0) as i32) & 255);
}

pub fn msg_write_angle16(sb: &mut SizeBuf, f: f32) {
    msg_write_short(sb, ((f * 65536.0 / 360.0) as i32) & 65535);
}

/// Pick the presence bits for a field sent as byte, short, or long.
fn width_bits(value: u32, narrow: UpdateBits, wide: UpdateBits, short_limit: u32) -> UpdateBits {
    if value < 256 {
        narrow
    } else if value < short_limit {
        wide
    } else {
        narrow | wide
    }
}

fn write_by_width(msg: &mut SizeBuf, bits: UpdateBits, narrow: UpdateBits, wide: UpdateBits, value: i32) {
    if bits.contains(narrow | wide) {
        msg_write_long(msg, value);
    } else if bits.contains(narrow) {
        msg_write_byte(msg, value);
    } else if bits.contains(wide) {
        msg_write_short(msg, value);
    }
}

fn write_model(msg: &mut SizeBuf, index: i32, remap_player: bool, protocol: i32) {
    if is_qii97_protocol(protocol) {
        if remap_player && index == CUSTOM_PLAYER_MODEL {
            msg_write_byte(msg, QII97_PLAYER_MODEL);
        } else {
            msg_write_byte(msg, index);
        }
    } else {
        msg_write_short(msg, index);
    }
}

/// Writes the presence bits and entity number that start every entity
/// update.
pub fn msg_write_entity_header(msg: &mut SizeBuf, mut bits: UpdateBits, number: i32) {
    if number >= 256 {
        bits |= U_NUMBER16;
    }

    let raw = bits.bits();
    if raw & 0xff000000 != 0 {
        bits |= U_MOREBITS3 | U_MOREBITS2 | U_MOREBITS1;
    } else if raw & 0x00ff0000 != 0 {
        bits |= U_MOREBITS2 | U_MOREBITS1;
    } else if raw & 0x0000ff00 != 0 {
        bits |= U_MOREBITS1;
    }
    let raw = bits.bits() as i32;

    msg_write_byte(msg, raw & 255);
    if bits.contains(U_MOREBITS1) {
        msg_write_byte(msg, (raw >> 8) & 255);
    }
    if bits.contains(U_MOREBITS2) {
        msg_write_byte(msg, (raw >> 16) & 255);
    }
    if bits.contains(U_MOREBITS3) {
        msg_write_byte(msg, (raw >> 24) & 255);
    }

    if bits.contains(U_NUMBER16) {
        msg_write_short(msg, number);
    } else {
        msg_write_byte(msg, number);
    }
}

/// Writes part of a packetentities message. Can delta from either a
/// baseline or a previous packet_entity. Returns the presence bits that
/// were sent, or None if nothing needed sending.
pub fn msg_write_delta_entity(
    from: &EntityState,
    to: &EntityState,
    msg: &mut SizeBuf,
    force: bool,
    newentity: bool,
    protocol: i32,
) -> Option<UpdateBits> {
    if to.number <= 0 || to.number as usize >= MAX_EDICTS {
        com_printf(&format!("MSG_WriteDeltaEntity: bad entity number {}\n", to.number));
        return None;
    }

    let current = protocol == PROTOCOL_VERSION;
    let mut bits = UpdateBits::empty();

    if to.origin[0] != from.origin[0] { bits |= U_ORIGIN1; }
    if to.origin[1] != from.origin[1] { bits |= U_ORIGIN2; }
    if to.origin[2] != from.origin[2] { bits |= U_ORIGIN3; }

    if to.angles[0] != from.angles[0] { bits |= U_ANGLE1; }
    if to.angles[1] != from.angles[1] { bits |= U_ANGLE2; }
    if to.angles[2] != from.angles[2] { bits |= U_ANGLE3; }

    if current && to.scale != from.scale {
        // scale only travels behind a 32 bit skin
        bits |= U_SKIN8 | U_SKIN16;
    } else if to.skinnum != from.skinnum {
        bits |= width_bits(to.skinnum as u32, U_SKIN8, U_SKIN16, 0x8000);
    }

    if to.frame != from.frame {
        if to.frame < 256 { bits |= U_FRAME8; } else { bits |= U_FRAME16; }
    }

    let effects_changed = to.effects != from.effects
        || (current && (to.rr_effects != from.rr_effects || to.rr_mesh != from.rr_mesh));
    if effects_changed {
        let widest = if current {
            to.effects.max(to.rr_effects).max(to.rr_mesh)
        } else {
            to.effects
        };
        bits |= width_bits(widest, U_EFFECTS8, U_EFFECTS16, 0x8000);
    }

    if to.renderfx != from.renderfx {
        bits |= width_bits(to.renderfx as u32, U_RENDERFX8, U_RENDERFX16, 0x8000);
    }

    if to.solid != from.solid { bits |= U_SOLID; }
    if to.event != 0 { bits |= U_EVENT; }
    if to.modelindex != from.modelindex { bits |= U_MODEL; }
    if to.modelindex2 != from.modelindex2 { bits |= U_MODEL2; }
    if to.modelindex3 != from.modelindex3 { bits |= U_MODEL3; }
    if to.modelindex4 != from.modelindex4 { bits |= U_MODEL4; }
    if to.sound != from.sound { bits |= U_SOUND; }

    if newentity || (to.renderfx & RF_BEAM != 0) {
        bits |= U_OLDORIGIN;
    }

    if bits.is_empty() && !force {
        return None;
    }

    msg_write_entity_header(msg, bits, to.number);

    if bits.contains(U_MODEL) { write_model(msg, to.modelindex, true, protocol); }
    if bits.contains(U_MODEL2) { write_model(msg, to.modelindex2, true, protocol); }
    if bits.contains(U_MODEL3) { write_model(msg, to.modelindex3, false, protocol); }
    if bits.contains(U_MODEL4) { write_model(msg, to.modelindex4, false, protocol); }

    if bits.contains(U_FRAME8) { msg_write_byte(msg, to.frame); }
    if bits.contains(U_FRAME16) { msg_write_short(msg, to.frame); }

    write_by_width(msg, bits, U_SKIN8, U_SKIN16, to.skinnum);
    if current && bits.contains(U_SKIN8 | U_SKIN16) {
        for v in to.scale {
            msg_write_float(msg, v);
        }
    }

    write_by_width(msg, bits, U_EFFECTS8, U_EFFECTS16, to.effects as i32);
    if current {
        write_by_width(msg, bits, U_EFFECTS8, U_EFFECTS16, to.rr_effects as i32);
        write_by_width(msg, bits, U_EFFECTS8, U_EFFECTS16, to.rr_mesh as i32);
    }

    write_by_width(msg, bits, U_RENDERFX8, U_RENDERFX16, to.renderfx);

    if bits.contains(U_ORIGIN1) { msg_write_coord(msg, to.origin[0], protocol); }
    if bits.contains(U_ORIGIN2) { msg_write_coord(msg, to.origin[1], protocol); }
    if bits.contains(U_ORIGIN3) { msg_write_coord(msg, to.origin[2], protocol); }

    if bits.contains(U_ANGLE1) { msg_write_angle(msg, to.angles[0]); }
    if bits.contains(U_ANGLE2) { msg_write_angle(msg, to.angles[1]); }
    if bits.contains(U_ANGLE3) { msg_write_angle(msg, to.angles[2]); }

    if bits.contains(U_OLDORIGIN) {
        msg_write_pos(msg, &to.old_origin, protocol);
    }

    if bits.contains(U_SOUND) { msg_write_byte(msg, to.sound); }
    if bits.contains(U_EVENT) { msg_write_byte(msg, to.event); }
    if bits.contains(U_SOLID) { msg_write_short(msg, to.solid); }

    Some(bits)
}

/// Writes a player state delta the way a server sends it after
/// svc_playerinfo. `origin` values are in 1/8 units.
pub fn msg_write_delta_playerstate(
    from: &PlayerState,
    from_origin: &[i32; 3],
    to: &PlayerState,
    to_origin: &[i32; 3],
    msg: &mut SizeBuf,
    protocol: i32,
) -> PlayerStateBits {
    let legacy = is_qii97_protocol(protocol);
    let mut flags = PlayerStateBits::empty();

    if to.pmove.pm_type != from.pmove.pm_type { flags |= PS_M_TYPE; }
    if to_origin != from_origin { flags |= PS_M_ORIGIN; }
    if to.pmove.velocity != from.pmove.velocity { flags |= PS_M_VELOCITY; }
    if to.pmove.pm_time != from.pmove.pm_time { flags |= PS_M_TIME; }
    if to.pmove.pm_flags != from.pmove.pm_flags { flags |= PS_M_FLAGS; }
    if to.pmove.gravity != from.pmove.gravity { flags |= PS_M_GRAVITY; }
    if to.pmove.delta_angles != from.pmove.delta_angles { flags |= PS_M_DELTA_ANGLES; }
    if to.viewoffset != from.viewoffset { flags |= PS_VIEWOFFSET; }
    if to.viewangles != from.viewangles { flags |= PS_VIEWANGLES; }
    if to.kick_angles != from.kick_angles { flags |= PS_KICKANGLES; }
    if to.blend != from.blend { flags |= PS_BLEND; }
    if to.fov != from.fov { flags |= PS_FOV; }
    if to.rdflags != from.rdflags { flags |= PS_RDFLAGS; }
    if to.gunindex != from.gunindex { flags |= PS_WEAPONINDEX; }
    if to.gunframe != from.gunframe
        || to.gunoffset != from.gunoffset
        || to.gunangles != from.gunangles
    {
        flags |= PS_WEAPONFRAME;
    }

    msg_write_short(msg, flags.bits() as i32);

    if flags.contains(PS_M_TYPE) { msg_write_byte(msg, to.pmove.pm_type as i32); }
    if flags.contains(PS_M_ORIGIN) {
        for &v in to_origin {
            if legacy { msg_write_short(msg, v); } else { msg_write_long(msg, v); }
        }
    }
    if flags.contains(PS_M_VELOCITY) {
        for v in to.pmove.velocity { msg_write_short(msg, v as i32); }
    }
    if flags.contains(PS_M_TIME) { msg_write_byte(msg, to.pmove.pm_time as i32); }
    if flags.contains(PS_M_FLAGS) { msg_write_byte(msg, to.pmove.pm_flags as i32); }
    if flags.contains(PS_M_GRAVITY) { msg_write_short(msg, to.pmove.gravity as i32); }
    if flags.contains(PS_M_DELTA_ANGLES) {
        for v in to.pmove.delta_angles { msg_write_short(msg, v as i32); }
    }

    if flags.contains(PS_VIEWOFFSET) {
        for v in to.viewoffset { msg_write_char(msg, (v * 4.0) as i32); }
    }
    if flags.contains(PS_VIEWANGLES) {
        for v in to.viewangles { msg_write_angle16(msg, v); }
    }
    if flags.contains(PS_KICKANGLES) {
        for v in to.kick_angles { msg_write_char(msg, (v * 4.0) as i32); }
    }
    if flags.contains(PS_WEAPONINDEX) {
        if legacy { msg_write_byte(msg, to.gunindex); } else { msg_write_short(msg, to.gunindex); }
    }
    if flags.contains(PS_WEAPONFRAME) {
        if legacy { msg_write_byte(msg, to.gunframe); } else { msg_write_short(msg, to.gunframe); }
        for v in to.gunoffset { msg_write_char(msg, (v * 4.0) as i32); }
        for v in to.gunangles { msg_write_char(msg, (v * 4.0) as i32); }
    }
    if flags.contains(PS_BLEND) {
        for v in to.blend { msg_write_byte(msg, (v * 255.0) as i32); }
    }
    if flags.contains(PS_FOV) { msg_write_byte(msg, to.fov as i32); }
    if flags.contains(PS_RDFLAGS) { msg_write_byte(msg, to.rdflags); }

    // stats
    let mut statbits: u32 = 0;
    for i in 0..MAX_STATS {
        if to.stats[i] != from.stats[i] {
            statbits |= 1 << i;
        }
    }
    if !legacy {
        msg_write_byte(msg, MAX_STATS as i32);
    }
    msg_write_long(msg, statbits as i32);
    for i in 0..MAX_STATS {
        if statbits & (1 << i) != 0 {
            msg_write_short(msg, to.stats[i] as i32);
        }
    }

    flags
}

// ============================================================
// MSG read functions
// ============================================================

pub fn msg_begin_reading(msg: &mut SizeBuf) {
    msg.readcount = 0;
}

pub fn msg_read_char(msg: &mut SizeBuf) -> MsgResult<i32> {
    let rc = msg.take(1)?;
    Ok(msg.data[rc] as i8 as i32)
}

pub fn msg_read_byte(msg: &mut SizeBuf) -> MsgResult<i32> {
    let rc = msg.take(1)?;
    Ok(msg.data[rc] as i32)
}

/// Reads the next opcode. End of message is not an error here.
pub fn msg_read_cmd(msg: &mut SizeBuf) -> Option<i32> {
    msg_read_byte(msg).ok()
}

pub fn msg_read_short(msg: &mut SizeBuf) -> MsgResult<i32> {
    let rc = msg.take(2)?;
    Ok(i16::from_le_bytes([msg.data[rc], msg.data[rc + 1]]) as i32)
}

pub fn msg_read_long(msg: &mut SizeBuf) -> MsgResult<i32> {
    let rc = msg.take(4)?;
    Ok(i32::from_le_bytes([msg.data[rc], msg.data[rc + 1], msg.data[rc + 2], msg.data[rc + 3]]))
}

pub fn msg_read_float(msg: &mut SizeBuf) -> MsgResult<f32> {
    let rc = msg.take(4)?;
    Ok(f32::from_le_bytes([msg.data[rc], msg.data[rc + 1], msg.data[rc + 2], msg.data[rc + 3]]))
}

/// Reads up to a terminator or the end of the message. Characters past
/// `max_len` are consumed but not kept.
pub fn msg_read_string(msg: &mut SizeBuf, max_len: usize) -> String {
    let mut result = String::new();
    let mut kept = 0;
    while let Ok(c) = msg_read_byte(msg) {
        if c == 0 {
            break;
        }
        if kept < max_len {
            result.push(c as u8 as char);
            kept += 1;
        }
    }
    result
}

pub fn msg_read_coord(msg: &mut SizeBuf, protocol: i32) -> MsgResult<f32> {
    if is_qii97_protocol(protocol) {
        Ok(msg_read_short(msg)? as f32 * (1.0 / 8.0))
    } else {
        msg_read_float(msg)
    }
}

pub fn msg_read_pos(msg: &mut SizeBuf, protocol: i32) -> MsgResult<Vec3> {
    Ok([
        msg_read_coord(msg, protocol)?,
        msg_read_coord(msg, protocol)?,
        msg_read_coord(msg, protocol)?,
    ])
}

pub fn msg_read_angle(msg: &mut SizeBuf) -> MsgResult<f32> {
    Ok(msg_read_char(msg)? as f32 * (360.0 / 256.0))
}

pub fn msg_read_angle16(msg: &mut SizeBuf) -> MsgResult<f32> {
    Ok(msg_read_short(msg)? as f32 * (360.0 / 65536.0))
}

pub fn msg_read_data(msg: &mut SizeBuf, len: usize) -> MsgResult<Vec<u8>> {
    let rc = msg.take(len as i32)?;
    Ok(msg.data[rc..rc + len].to_vec())
}
