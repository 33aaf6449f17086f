// cl_delta.rs -- entity delta decoding
//
// Every optional entity field is described once in ENTITY_FIELDS: which
// presence bits announce it, how it is encoded on the wire and where the
// value lands. The table order is the wire order.

use q2snap_common::common::{
    msg_read_angle, msg_read_byte, msg_read_coord, msg_read_float, msg_read_long,
    msg_read_pos, msg_read_short,
};
use q2snap_common::q_shared::{EntityState, Vec3, CUSTOM_PLAYER_MODEL, QII97_PLAYER_MODEL};
use q2snap_common::qcommon::{
    Dialect, SizeBuf, UpdateBits, U_ANGLE1, U_ANGLE2, U_ANGLE3, U_EFFECTS16, U_EFFECTS8,
    U_EVENT, U_FRAME16, U_FRAME8, U_MODEL, U_MODEL2, U_MODEL3, U_MODEL4, U_OLDORIGIN,
    U_ORIGIN1, U_ORIGIN2, U_ORIGIN3, U_RENDERFX16, U_RENDERFX8, U_SKIN16, U_SKIN8, U_SOLID,
    U_SOUND,
};

use crate::error::ParseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Short,
    Long,
}

/// How a field is laid out on the wire.
#[derive(Clone, Copy)]
pub enum Encoding {
    /// `narrow` alone is a byte, `wide` alone a short, both a long.
    Pair { narrow: UpdateBits, wide: UpdateBits, store: fn(&mut EntityState, i32) },
    Fixed { bit: UpdateBits, width: Width, store: fn(&mut EntityState, i32) },
    /// Byte under the legacy dialect (optionally remapping the old player
    /// model slot), short otherwise.
    Model { bit: UpdateBits, remap_player: bool, store: fn(&mut EntityState, i32) },
    Coord { bit: UpdateBits, store: fn(&mut EntityState, f32) },
    Angle { bit: UpdateBits, store: fn(&mut EntityState, f32) },
    Pos { bit: UpdateBits, store: fn(&mut EntityState, Vec3) },
    /// Three floats, only present when both bits are set.
    Floats3 { both: UpdateBits, store: fn(&mut EntityState, Vec3) },
}

/// One optional entity field.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub encoding: Encoding,
    /// Only the current dialect sends it.
    pub current_only: bool,
}

impl FieldSpec {
    /// Whether `bits` announces this field.
    pub fn present(&self, bits: UpdateBits) -> bool {
        match self.encoding {
            Encoding::Pair { narrow, wide, .. } => bits.intersects(narrow | wide),
            Encoding::Floats3 { both, .. } => bits.contains(both),
            Encoding::Fixed { bit, .. }
            | Encoding::Model { bit, .. }
            | Encoding::Coord { bit, .. }
            | Encoding::Angle { bit, .. }
            | Encoding::Pos { bit, .. } => bits.contains(bit),
        }
    }

    pub fn carried_by(&self, dialect: Dialect) -> bool {
        !self.current_only || dialect == Dialect::Current
    }

    /// Read the field and store it into `to`. The caller has checked
    /// presence.
    pub fn read(
        &self,
        to: &mut EntityState,
        bits: UpdateBits,
        protocol: i32,
        msg: &mut SizeBuf,
    ) -> ParseResult<()> {
        match self.encoding {
            Encoding::Pair { narrow, wide, store } => {
                let width = if bits.contains(narrow | wide) {
                    Width::Long
                } else if bits.contains(narrow) {
                    Width::Byte
                } else {
                    Width::Short
                };
                store(to, read_width(msg, width)?);
            }
            Encoding::Fixed { width, store, .. } => store(to, read_width(msg, width)?),
            Encoding::Model { remap_player, store, .. } => {
                let value = if Dialect::from_protocol(protocol) == Dialect::Legacy {
                    let v = msg_read_byte(msg)?;
                    if remap_player && v == QII97_PLAYER_MODEL {
                        CUSTOM_PLAYER_MODEL
                    } else {
                        v
                    }
                } else {
                    msg_read_short(msg)?
                };
                store(to, value);
            }
            Encoding::Coord { store, .. } => store(to, msg_read_coord(msg, protocol)?),
            Encoding::Angle { store, .. } => store(to, msg_read_angle(msg)?),
            Encoding::Pos { store, .. } => store(to, msg_read_pos(msg, protocol)?),
            Encoding::Floats3 { store, .. } => {
                let v = [msg_read_float(msg)?, msg_read_float(msg)?, msg_read_float(msg)?];
                store(to, v);
            }
        }
        Ok(())
    }
}

fn read_width(msg: &mut SizeBuf, width: Width) -> ParseResult<i32> {
    Ok(match width {
        Width::Byte => msg_read_byte(msg)?,
        Width::Short => msg_read_short(msg)?,
        Width::Long => msg_read_long(msg)?,
    })
}

const SKIN32: UpdateBits = U_SKIN8.union(U_SKIN16);

pub static ENTITY_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "modelindex",
        encoding: Encoding::Model { bit: U_MODEL, remap_player: true, store: |s, v| s.modelindex = v },
        current_only: false,
    },
    FieldSpec {
        name: "modelindex2",
        encoding: Encoding::Model { bit: U_MODEL2, remap_player: true, store: |s, v| s.modelindex2 = v },
        current_only: false,
    },
    FieldSpec {
        name: "modelindex3",
        encoding: Encoding::Model { bit: U_MODEL3, remap_player: false, store: |s, v| s.modelindex3 = v },
        current_only: false,
    },
    FieldSpec {
        name: "modelindex4",
        encoding: Encoding::Model { bit: U_MODEL4, remap_player: false, store: |s, v| s.modelindex4 = v },
        current_only: false,
    },
    // the two frame widths are independent reads
    FieldSpec {
        name: "frame8",
        encoding: Encoding::Fixed { bit: U_FRAME8, width: Width::Byte, store: |s, v| s.frame = v },
        current_only: false,
    },
    FieldSpec {
        name: "frame16",
        encoding: Encoding::Fixed { bit: U_FRAME16, width: Width::Short, store: |s, v| s.frame = v },
        current_only: false,
    },
    FieldSpec {
        name: "skinnum",
        encoding: Encoding::Pair { narrow: U_SKIN8, wide: U_SKIN16, store: |s, v| s.skinnum = v },
        current_only: false,
    },
    FieldSpec {
        name: "scale",
        encoding: Encoding::Floats3 { both: SKIN32, store: |s, v| s.scale = v },
        current_only: true,
    },
    FieldSpec {
        name: "effects",
        encoding: Encoding::Pair { narrow: U_EFFECTS8, wide: U_EFFECTS16, store: |s, v| s.effects = v as u32 },
        current_only: false,
    },
    FieldSpec {
        name: "rr_effects",
        encoding: Encoding::Pair { narrow: U_EFFECTS8, wide: U_EFFECTS16, store: |s, v| s.rr_effects = v as u32 },
        current_only: true,
    },
    FieldSpec {
        name: "rr_mesh",
        encoding: Encoding::Pair { narrow: U_EFFECTS8, wide: U_EFFECTS16, store: |s, v| s.rr_mesh = v as u32 },
        current_only: true,
    },
    FieldSpec {
        name: "renderfx",
        encoding: Encoding::Pair { narrow: U_RENDERFX8, wide: U_RENDERFX16, store: |s, v| s.renderfx = v },
        current_only: false,
    },
    FieldSpec {
        name: "origin[0]",
        encoding: Encoding::Coord { bit: U_ORIGIN1, store: |s, v| s.origin[0] = v },
        current_only: false,
    },
    FieldSpec {
        name: "origin[1]",
        encoding: Encoding::Coord { bit: U_ORIGIN2, store: |s, v| s.origin[1] = v },
        current_only: false,
    },
    FieldSpec {
        name: "origin[2]",
        encoding: Encoding::Coord { bit: U_ORIGIN3, store: |s, v| s.origin[2] = v },
        current_only: false,
    },
    FieldSpec {
        name: "angles[0]",
        encoding: Encoding::Angle { bit: U_ANGLE1, store: |s, v| s.angles[0] = v },
        current_only: false,
    },
    FieldSpec {
        name: "angles[1]",
        encoding: Encoding::Angle { bit: U_ANGLE2, store: |s, v| s.angles[1] = v },
        current_only: false,
    },
    FieldSpec {
        name: "angles[2]",
        encoding: Encoding::Angle { bit: U_ANGLE3, store: |s, v| s.angles[2] = v },
        current_only: false,
    },
    FieldSpec {
        name: "old_origin",
        encoding: Encoding::Pos { bit: U_OLDORIGIN, store: |s, v| s.old_origin = v },
        current_only: false,
    },
    FieldSpec {
        name: "sound",
        encoding: Encoding::Fixed { bit: U_SOUND, width: Width::Byte, store: |s, v| s.sound = v },
        current_only: false,
    },
    FieldSpec {
        name: "event",
        encoding: Encoding::Fixed { bit: U_EVENT, width: Width::Byte, store: |s, v| s.event = v },
        current_only: false,
    },
    FieldSpec {
        name: "solid",
        encoding: Encoding::Fixed { bit: U_SOLID, width: Width::Short, store: |s, v| s.solid = v },
        current_only: false,
    },
];

/// Can go from either a baseline or a previous packet_entity.
pub fn cl_parse_delta(
    from: &EntityState,
    number: i32,
    bits: UpdateBits,
    protocol: i32,
    msg: &mut SizeBuf,
) -> ParseResult<EntityState> {
    let dialect = Dialect::from_protocol(protocol);

    // set everything to the state we are delta'ing from
    let mut to = *from;
    to.old_origin = from.origin;
    to.number = number;
    // events only go out for a single frame
    to.event = 0;

    if dialect != Dialect::Current {
        to.scale = [1.0; 3];
        to.rr_effects = 0;
        to.rr_mesh = 0;
    }

    for field in ENTITY_FIELDS {
        if field.carried_by(dialect) && field.present(bits) {
            field.read(&mut to, bits, protocol, msg)?;
        }
    }

    Ok(to)
}
