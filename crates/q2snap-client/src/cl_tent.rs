// cl_tent.rs -- client side temporary entities
//
// Only the wire payload is decoded here. Particles, beams and explosions
// are built by the effects layer from the returned value.

use q2snap_common::common::{
    msg_read_byte, msg_read_long, msg_read_pos, msg_read_short, NUMVERTEXNORMALS,
};
use q2snap_common::q_shared::{TempEvent, Vec3};
use q2snap_common::qcommon::SizeBuf;

use crate::error::{ParseError, ParseResult};

/// Decoded svc_temp_entity payload. Directions are indices into the
/// vertex normal table.
#[derive(Debug, Clone, PartialEq)]
pub enum TempPayload {
    Point { pos: Vec3 },
    PointDir { pos: Vec3, dir: u8 },
    /// A position followed by a full vector instead of a normal index.
    PointVector { pos: Vec3, vec: Vec3 },
    Segment { start: Vec3, end: Vec3 },
    Colored { count: i32, pos: Vec3, dir: u8, color: i32 },
    Beam { ent: i32, start: Vec3, end: Vec3, offset: Option<Vec3> },
    Lightning { src: i32, dest: i32, start: Vec3, end: Vec3 },
    Flashlight { pos: Vec3, ent: i32 },
    Forcewall { start: Vec3, end: Vec3, color: i32 },
    /// `duration` is only sent for sustained (id != -1) steam.
    Steam { id: i32, count: i32, pos: Vec3, dir: u8, color: i32, magnitude: i32, duration: Option<i32> },
    Widow { id: i32, pos: Vec3 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempEntity {
    pub kind: TempEvent,
    pub payload: TempPayload,
}

fn read_dir(net_message: &mut SizeBuf) -> ParseResult<u8> {
    let b = msg_read_byte(net_message)?;
    if b as usize >= NUMVERTEXNORMALS {
        return Err(ParseError::BadDirection(b));
    }
    Ok(b as u8)
}

fn read_beam(net_message: &mut SizeBuf, protocol: i32, with_offset: bool) -> ParseResult<TempPayload> {
    let ent = msg_read_short(net_message)?;
    let start = msg_read_pos(net_message, protocol)?;
    let end = msg_read_pos(net_message, protocol)?;
    let offset = if with_offset {
        Some(msg_read_pos(net_message, protocol)?)
    } else {
        None
    };
    Ok(TempPayload::Beam { ent, start, end, offset })
}

fn read_steam(net_message: &mut SizeBuf, protocol: i32) -> ParseResult<TempPayload> {
    let id = msg_read_short(net_message)?;
    let count = msg_read_byte(net_message)?;
    let pos = msg_read_pos(net_message, protocol)?;
    let dir = read_dir(net_message)?;
    let color = msg_read_byte(net_message)?;
    let magnitude = msg_read_short(net_message)?;
    let duration = if id != -1 {
        Some(msg_read_long(net_message)?)
    } else {
        None
    };
    Ok(TempPayload::Steam { id, count, pos, dir, color, magnitude, duration })
}

/// CL_ParseTEnt
pub fn cl_parse_tent(net_message: &mut SizeBuf, protocol: i32) -> ParseResult<TempEntity> {
    use TempEvent::*;

    let te_type = msg_read_byte(net_message)?;
    let kind = TempEvent::from_i32(te_type).ok_or(ParseError::BadTempEntity(te_type))?;

    let payload = match kind {
        Blood | Gunshot | Sparks | BulletSparks | ScreenSparks | ShieldSparks | Shotgun
        | Blaster | Greenblood | Blaster2 | Flechette | HeatbeamSparks | HeatbeamSteam
        | Moreblood | ElectricSparks => TempPayload::PointDir {
            pos: msg_read_pos(net_message, protocol)?,
            dir: read_dir(net_message)?,
        },

        Splash | LaserSparks | WeldingSparks | TunnelSparks => TempPayload::Colored {
            count: msg_read_byte(net_message)?,
            pos: msg_read_pos(net_message, protocol)?,
            dir: read_dir(net_message)?,
            color: msg_read_byte(net_message)?,
        },

        Bluehyperblaster => TempPayload::PointVector {
            pos: msg_read_pos(net_message, protocol)?,
            vec: msg_read_pos(net_message, protocol)?,
        },

        Railtrail | Bubbletrail | Bubbletrail2 | Debugtrail | BfgLaser => {
            TempPayload::Segment {
                start: msg_read_pos(net_message, protocol)?,
                end: msg_read_pos(net_message, protocol)?,
            }
        }

        Explosion1 | Explosion1Big | Explosion1Np | Explosion2 | RocketExplosion
        | RocketExplosionWater | GrenadeExplosion | GrenadeExplosionWater | PlasmaExplosion
        | PlainExplosion | BfgExplosion | BfgBigexplosion | Bosstport | TrackerExplosion
        | TeleportEffect | DballGoal | Widowsplash | Nukeblast | ChainfistSmoke => {
            TempPayload::Point { pos: msg_read_pos(net_message, protocol)? }
        }

        ParasiteAttack | MedicCableAttack | Heatbeam | MonsterHeatbeam => {
            read_beam(net_message, protocol, false)?
        }
        GrappleCable => read_beam(net_message, protocol, true)?,

        Lightning => TempPayload::Lightning {
            src: msg_read_short(net_message)?,
            dest: msg_read_short(net_message)?,
            start: msg_read_pos(net_message, protocol)?,
            end: msg_read_pos(net_message, protocol)?,
        },

        Flashlight => TempPayload::Flashlight {
            pos: msg_read_pos(net_message, protocol)?,
            ent: msg_read_short(net_message)?,
        },

        Forcewall => TempPayload::Forcewall {
            start: msg_read_pos(net_message, protocol)?,
            end: msg_read_pos(net_message, protocol)?,
            color: msg_read_byte(net_message)?,
        },

        Steam => read_steam(net_message, protocol)?,

        Widowbeamout => TempPayload::Widow {
            id: msg_read_short(net_message)?,
            pos: msg_read_pos(net_message, protocol)?,
        },

        // defined but never sent to clients
        Railtrail2 | Flame => return Err(ParseError::BadTempEntity(te_type)),
    };

    Ok(TempEntity { kind, payload })
}
