// cl_ents.rs -- entity parsing and management
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use q2snap_common::common::{
    com_printf, msg_read_angle16, msg_read_byte, msg_read_char, msg_read_long,
    msg_read_short, msg_read_data,
};
use q2snap_common::q_shared::{
    EntityState, PmType, EF_TELEPORTER, EV_OTHER_TELEPORT, EV_PLAYER_TELEPORT, MAX_EDICTS,
    MAX_STATS, PMF_NO_PREDICTION, STAT_PICKUP_STRING,
};
use q2snap_common::qcommon::{
    is_qii97_protocol, SizeBuf, UpdateBits, PROTOCOL_RELEASE_VERSION, PS_BLEND, PS_FOV,
    PS_KICKANGLES, PS_M_DELTA_ANGLES, PS_M_FLAGS, PS_M_GRAVITY, PS_M_ORIGIN, PS_M_TIME,
    PS_M_TYPE, PS_M_VELOCITY, PS_RDFLAGS, PS_VIEWANGLES, PS_VIEWOFFSET, PS_WEAPONFRAME,
    PS_WEAPONINDEX, PlayerStateBits, SVC_PACKETENTITIES, SVC_PLAYERINFO, U_MOREBITS1,
    U_MOREBITS2, U_MOREBITS3, U_NUMBER16, U_REMOVE,
};

use crate::cl_delta::cl_parse_delta;
use crate::cl_parse::{cl_show_net_cmd, p_convert_config_string_from};
use crate::cl_ring::EntityPool;
use crate::client::*;
use crate::error::{ParseError, ParseResult};

/// Old-frame cursor value once the old entity list is exhausted.
const NO_OLD_ENTITY: i32 = 99999;

/// Entities that move further than this on any axis between two frames
/// are not interpolated.
const NO_LERP_DISTANCE: f32 = 512.0;

// =========================================================================
// FRAME PARSING
// =========================================================================

/// CL_ParseEntityBits -- Returns the entity number and the header bits.
/// An out of range number is rejected before anything is counted.
pub fn cl_parse_entity_bits(
    net_message: &mut SizeBuf,
    stats: &mut ParseStats,
) -> ParseResult<(i32, UpdateBits)> {
    let mut total = msg_read_byte(net_message)? as u32;
    if total & U_MOREBITS1.bits() != 0 {
        total |= (msg_read_byte(net_message)? as u32) << 8;
    }
    if total & U_MOREBITS2.bits() != 0 {
        total |= (msg_read_byte(net_message)? as u32) << 16;
    }
    if total & U_MOREBITS3.bits() != 0 {
        total |= (msg_read_byte(net_message)? as u32) << 24;
    }

    let number = if total & U_NUMBER16.bits() != 0 {
        msg_read_short(net_message)?
    } else {
        msg_read_byte(net_message)?
    };

    if number < 0 || number >= MAX_EDICTS as i32 {
        return Err(ParseError::BadEntityNumber { number, max: MAX_EDICTS as i32 });
    }

    // count the bits for net profiling
    for (i, count) in stats.bitcounts.iter_mut().enumerate() {
        if total & (1 << i) != 0 {
            *count += 1;
        }
    }

    Ok((number, UpdateBits::from_bits_retain(total)))
}

/// CL_DeltaEntity -- Parses deltas from the given base and adds the
/// resulting entity to the current frame.
pub fn cl_delta_entity(
    frame: &mut Frame,
    newnum: i32,
    old: &EntityState,
    bits: UpdateBits,
    protocol: i32,
    ent_state: &mut ClientEntState,
    net_message: &mut SizeBuf,
) -> ParseResult<()> {
    let state = cl_parse_delta(old, newnum, bits, protocol, net_message)?;

    ent_state.cl_parse_entities.push(state);
    frame.num_entities += 1;

    let ent = &mut ent_state.cl_entities[newnum as usize];
    cl_update_centity(ent, &state, frame.serverframe);
    Ok(())
}

/// Moves a freshly decoded state into an entity's interpolation pair.
pub fn cl_update_centity(ent: &mut CEntity, state: &EntityState, serverframe: i32) {
    // non-finite coordinates count as a jump
    let far = |axis: usize| {
        let moved = (state.origin[axis] - ent.current.origin[axis]).abs();
        moved.is_nan() || moved > NO_LERP_DISTANCE
    };

    // some data changes will force no lerping
    if state.modelindex != ent.current.modelindex
        || state.modelindex2 != ent.current.modelindex2
        || state.modelindex3 != ent.current.modelindex3
        || state.modelindex4 != ent.current.modelindex4
        || state.event == EV_PLAYER_TELEPORT
        || state.event == EV_OTHER_TELEPORT
        || far(0)
        || far(1)
        || far(2)
    {
        ent.serverframe = -99;
    }

    if ent.serverframe != serverframe.wrapping_sub(1) {
        // wasn't in last update, so initialize some things
        ent.trailcount = 1024; // for diminishing rocket / grenade trails

        // duplicate the current state so lerping doesn't hurt anything
        ent.prev = *state;
        let from = if state.event == EV_OTHER_TELEPORT {
            state.origin
        } else {
            state.old_origin
        };
        ent.prev.origin = from;
        ent.lerp_origin = from;
    } else {
        // shuffle the last state to previous
        ent.prev = ent.current;
    }

    ent.serverframe = serverframe;
    ent.current = *state;
}

/// The old-frame entity at `oldindex`, or the end-of-list sentinel.
fn old_entity(
    oldframe: Option<&Frame>,
    oldindex: i32,
    pool: &EntityPool,
) -> ParseResult<(i32, EntityState)> {
    match oldframe {
        Some(of) if oldindex < of.num_entities => {
            let state = *pool.get(of.parse_entities.wrapping_add(oldindex))?;
            Ok((state.number, state))
        }
        _ => Ok((NO_OLD_ENTITY, EntityState::default())),
    }
}

/// CL_ParsePacketEntities -- An svc_packetentities has just been parsed,
/// deal with the rest of the data stream.
///
/// New entity numbers arrive in ascending order and are merged against
/// the old frame's list: old entities below the next new number carry
/// over unchanged, a remove drops the old entry, an equal number deltas
/// from the old entry and anything else deltas from the baseline.
pub fn cl_parse_packet_entities(
    oldframe: Option<&Frame>,
    newframe: &mut Frame,
    ent_state: &mut ClientEntState,
    protocol: i32,
    shownet: i32,
    stats: &mut ParseStats,
    net_message: &mut SizeBuf,
) -> ParseResult<()> {
    newframe.parse_entities = ent_state.cl_parse_entities.head();
    newframe.num_entities = 0;

    // delta from the entities present in oldframe
    let mut oldindex: i32 = 0;
    let (mut oldnum, mut oldstate) = old_entity(oldframe, oldindex, &ent_state.cl_parse_entities)?;

    loop {
        let (newnum, bits) = cl_parse_entity_bits(net_message, stats)?;
        if newnum == 0 {
            break;
        }

        while oldnum < newnum {
            // one or more entities from the old packet are unchanged
            if shownet == 3 {
                com_printf(&format!("   unchanged: {}\n", oldnum));
            }
            cl_delta_entity(newframe, oldnum, &oldstate, UpdateBits::empty(), protocol, ent_state, net_message)?;

            oldindex += 1;
            (oldnum, oldstate) = old_entity(oldframe, oldindex, &ent_state.cl_parse_entities)?;
        }

        if bits.contains(U_REMOVE) {
            // the entity present in oldframe is not in the current frame
            if shownet == 3 {
                com_printf(&format!("   remove: {}\n", newnum));
            }
            if oldnum != newnum {
                stats.soft_warning("U_REMOVE: oldnum != newnum\n");
            }

            oldindex += 1;
            (oldnum, oldstate) = old_entity(oldframe, oldindex, &ent_state.cl_parse_entities)?;
            continue;
        }

        if oldnum == newnum {
            // delta from previous state
            if shownet == 3 {
                com_printf(&format!("   delta: {}\n", newnum));
            }
            cl_delta_entity(newframe, newnum, &oldstate, bits, protocol, ent_state, net_message)?;

            oldindex += 1;
            (oldnum, oldstate) = old_entity(oldframe, oldindex, &ent_state.cl_parse_entities)?;
            continue;
        }

        // oldnum > newnum: delta from baseline
        if shownet == 3 {
            com_printf(&format!("   baseline: {}\n", newnum));
        }
        let baseline = ent_state.cl_entities[newnum as usize].baseline;
        cl_delta_entity(newframe, newnum, &baseline, bits, protocol, ent_state, net_message)?;
    }

    // any remaining entities in the old frame are copied over
    while oldnum != NO_OLD_ENTITY {
        if shownet == 3 {
            com_printf(&format!("   unchanged: {}\n", oldnum));
        }
        cl_delta_entity(newframe, oldnum, &oldstate, UpdateBits::empty(), protocol, ent_state, net_message)?;

        oldindex += 1;
        (oldnum, oldstate) = old_entity(oldframe, oldindex, &ent_state.cl_parse_entities)?;
    }

    Ok(())
}

fn read_quarter_units(net_message: &mut SizeBuf) -> ParseResult<[f32; 3]> {
    Ok([
        msg_read_char(net_message)? as f32 * 0.25,
        msg_read_char(net_message)? as f32 * 0.25,
        msg_read_char(net_message)? as f32 * 0.25,
    ])
}

fn read_shorts(net_message: &mut SizeBuf) -> ParseResult<[i16; 3]> {
    Ok([
        msg_read_short(net_message)? as i16,
        msg_read_short(net_message)? as i16,
        msg_read_short(net_message)? as i16,
    ])
}

/// CL_ParsePlayerstate
pub fn cl_parse_playerstate(
    oldframe: Option<&Frame>,
    newframe: &mut Frame,
    attractloop: bool,
    protocol: i32,
    stats: &mut ParseStats,
    net_message: &mut SizeBuf,
) -> ParseResult<()> {
    let legacy = is_qii97_protocol(protocol);

    // clear to old value before delta parsing
    match oldframe {
        Some(of) => {
            newframe.playerstate = of.playerstate;
            newframe.origin = of.origin;
        }
        None => {
            newframe.playerstate = Default::default();
            newframe.origin = [0; 3];
        }
    }
    let state = &mut newframe.playerstate;

    let flags = PlayerStateBits::from_bits_retain(msg_read_short(net_message)? as u16 as u32);

    //
    // parse the pmove_state_t
    //
    if flags.contains(PS_M_TYPE) {
        let value = msg_read_byte(net_message)?;
        match PmType::from_i32(value) {
            Some(pm_type) => state.pmove.pm_type = pm_type,
            None => stats.soft_warning(&format!("CL_ParsePlayerstate: unknown pm_type {}\n", value)),
        }
    }

    if flags.contains(PS_M_ORIGIN) {
        for axis in newframe.origin.iter_mut() {
            *axis = if legacy {
                msg_read_short(net_message)?
            } else {
                msg_read_long(net_message)?
            };
        }
    }

    if flags.contains(PS_M_VELOCITY) {
        state.pmove.velocity = read_shorts(net_message)?;
    }

    if flags.contains(PS_M_TIME) {
        state.pmove.pm_time = msg_read_byte(net_message)? as u8;
    }

    if flags.contains(PS_M_FLAGS) {
        state.pmove.pm_flags = msg_read_byte(net_message)? as u8;
    }

    if flags.contains(PS_M_GRAVITY) {
        state.pmove.gravity = msg_read_short(net_message)? as i16;
    }

    if flags.contains(PS_M_DELTA_ANGLES) {
        state.pmove.delta_angles = read_shorts(net_message)?;
    }

    if attractloop {
        state.pmove.pm_type = PmType::Freeze; // demo playback
    }

    //
    // parse the rest of the player_state_t
    //
    if flags.contains(PS_VIEWOFFSET) {
        state.viewoffset = read_quarter_units(net_message)?;
    }

    if flags.contains(PS_VIEWANGLES) {
        state.viewangles = [
            msg_read_angle16(net_message)?,
            msg_read_angle16(net_message)?,
            msg_read_angle16(net_message)?,
        ];
    }

    if flags.contains(PS_KICKANGLES) {
        state.kick_angles = read_quarter_units(net_message)?;
    }

    if flags.contains(PS_WEAPONINDEX) {
        state.gunindex = if legacy {
            msg_read_byte(net_message)?
        } else {
            msg_read_short(net_message)?
        };
    }

    if flags.contains(PS_WEAPONFRAME) {
        state.gunframe = if legacy {
            msg_read_byte(net_message)?
        } else {
            msg_read_short(net_message)?
        };
        state.gunoffset = read_quarter_units(net_message)?;
        state.gunangles = read_quarter_units(net_message)?;
    }

    if flags.contains(PS_BLEND) {
        for channel in state.blend.iter_mut() {
            *channel = msg_read_byte(net_message)? as f32 / 255.0;
        }
    }

    if flags.contains(PS_FOV) {
        state.fov = msg_read_byte(net_message)? as f32;
    }

    if flags.contains(PS_RDFLAGS) {
        state.rdflags = msg_read_byte(net_message)?;
    }

    // parse stats
    let stats_size = if legacy {
        MAX_STATS
    } else {
        msg_read_byte(net_message)? as usize
    };

    let mut statbits = [0u32; 8];
    for word in statbits.iter_mut().take(stats_size.div_ceil(32)) {
        *word = msg_read_long(net_message)? as u32;
    }

    for i in 0..stats_size {
        if statbits[i / 32] & (1 << (i % 32)) == 0 {
            continue;
        }
        let value = msg_read_short(net_message)?;
        if i < MAX_STATS {
            state.stats[i] = if i == STAT_PICKUP_STRING {
                p_convert_config_string_from(value, protocol) as i16
            } else {
                value as i16
            };
        } else {
            stats.soft_warning(&format!("CL_ParsePlayerstate: unknown stats {}: {}\n", i, value));
        }
    }

    Ok(())
}

/// CL_FireEntityEvents
pub fn cl_fire_entity_events(
    frame: &Frame,
    ent_state: &ClientEntState,
    callbacks: &mut dyn ClientCallbacks,
) -> ParseResult<()> {
    for s1 in ent_state.cl_parse_entities.run(frame.parse_entities, frame.num_entities)? {
        if s1.event != 0 {
            callbacks.cl_entity_event(&s1);
        }
        if s1.effects & EF_TELEPORTER != 0 {
            callbacks.cl_teleporter_particles(&s1);
        }
    }
    Ok(())
}

/// CL_ParseFrame -- Decodes svc_frame and the playerinfo and
/// packetentities blocks that must follow it. The frame is stored in the
/// history ring and queued for publishing once the whole message is read.
pub fn cl_parse_frame(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let protocol = ctx.cls.server_protocol;
    let shownet = ctx.settings.shownet;

    let mut frame = Frame {
        serverframe: msg_read_long(net_message)?,
        deltaframe: msg_read_long(net_message)?,
        ..Default::default()
    };
    frame.servertime = frame.serverframe.wrapping_mul(100);

    // BIG HACK to let old demos continue to work
    if protocol != PROTOCOL_RELEASE_VERSION {
        ctx.cl.surpresscount = msg_read_byte(net_message)?;
    }

    if shownet == 3 {
        com_printf(&format!("   frame:{}  delta:{}\n", frame.serverframe, frame.deltaframe));
    }

    // If the frame is delta compressed from data that we no longer have
    // available, we must suck up the rest of the frame, but not use it,
    // then ask for a non-compressed message.
    let old = if frame.deltaframe <= 0 {
        frame.valid = true; // uncompressed frame
        ctx.cls.demo_waiting = false; // we can start recording now
        None
    } else {
        let old = ctx.cl.frames.slot(frame.deltaframe).clone();
        let mut usable = true;

        if !old.valid {
            // should never happen
            com_printf("Delta from invalid frame (not supposed to happen!).\n");
            usable = false;
        }

        if old.serverframe != frame.deltaframe {
            // The frame that the server did the delta from is too old, so
            // we can't reconstruct it properly.
            com_printf("Delta frame too old.\n");
            usable = false;
        } else if ctx.ent_state.cl_parse_entities.is_stale(old.parse_entities) {
            com_printf("Delta parse_entities too old.\n");
            usable = false;
        }

        if usable {
            frame.valid = true; // valid delta parse
            Some(old)
        } else {
            ctx.stats.stale_deltas += 1;
            None
        }
    };

    // clamp time
    let earliest = frame.servertime.saturating_sub(100);
    if ctx.cl.time > frame.servertime {
        ctx.cl.time = frame.servertime;
    } else if ctx.cl.time < earliest {
        ctx.cl.time = earliest;
    }

    // read areabits
    let len = msg_read_byte(net_message)? as usize;
    let areabits = msg_read_data(net_message, len)?;
    if len > frame.areabits.len() {
        ctx.stats.soft_warning(&format!("CL_ParseFrame: {} bytes of areabits, keeping {}\n", len, frame.areabits.len()));
    }
    let kept = len.min(frame.areabits.len());
    frame.areabits[..kept].copy_from_slice(&areabits[..kept]);

    // read playerinfo
    let cmd = msg_read_byte(net_message)?;
    cl_show_net_cmd(net_message, cmd, shownet);
    if cmd != SVC_PLAYERINFO {
        return Err(ParseError::NotPlayerInfo { cmd });
    }
    cl_parse_playerstate(old.as_ref(), &mut frame, ctx.cl.attractloop, protocol, ctx.stats, net_message)?;

    // read packet entities
    let cmd = msg_read_byte(net_message)?;
    cl_show_net_cmd(net_message, cmd, shownet);
    if cmd != SVC_PACKETENTITIES {
        return Err(ParseError::NotPacketEntities { cmd });
    }
    cl_parse_packet_entities(old.as_ref(), &mut frame, ctx.ent_state, protocol, shownet, ctx.stats, net_message)?;

    // save the frame off in the backup array for later delta comparisons
    *ctx.cl.frames.slot_mut(frame.serverframe) = frame.clone();
    ctx.cl.frame = frame.clone();
    ctx.cl.pending_frames.push(frame);

    Ok(())
}

/// Hands a fully decoded frame to the rest of the client.
pub fn cl_publish_frame(ctx: &mut ParseContext<'_>, frame: &Frame) -> ParseResult<()> {
    if !frame.valid {
        return Ok(());
    }

    // getting a valid frame message ends the connection process
    if ctx.cls.state != ConnState::Active {
        ctx.cls.state = ConnState::Active;
        ctx.cl.force_refdef = true;
        for i in 0..3 {
            ctx.cl.predicted_origin[i] = frame.origin[i] as f32 * 0.125;
        }
        ctx.cl.predicted_angles = frame.playerstate.viewangles;

        if ctx.cls.disable_servercount != ctx.cl.servercount && ctx.cl.refresh_prepped {
            ctx.callbacks.scr_end_loading_plaque(); // get rid of loading plaque
        }
        ctx.cl.sound_prepped = true;
    }

    // fire entity events
    cl_fire_entity_events(frame, ctx.ent_state, ctx.callbacks)?;

    if ctx.settings.predict && frame.playerstate.pmove.pm_flags & PMF_NO_PREDICTION == 0 {
        ctx.callbacks.cl_check_prediction_error(frame);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use q2snap_common::common::{
        msg_write_byte, msg_write_delta_entity, msg_write_delta_playerstate,
        msg_write_entity_header, msg_write_long, msg_write_short, msg_write_string,
    };
    use q2snap_common::q_shared::{PlayerState, CS_GENERAL, EV_FOOTSTEP};
    use q2snap_common::qcommon::{
        PROTOCOL_R97_VERSION, PROTOCOL_VERSION, SVC_FRAME, SVC_SERVERDATA, U_ORIGIN1, U_ORIGIN2,
    };

    use crate::cl_main::{ClientConfig, ClientProtocolState};
    use crate::test_support::{end_packet_entities, write_frame, Harness, RecordingCallbacks};

    fn ent(number: i32, modelindex: i32, x: f32) -> EntityState {
        EntityState { number, modelindex, origin: [x, 0.0, 0.0], scale: [1.0; 3], ..Default::default() }
    }

    fn frame_numbers(h: &Harness, frame: &Frame) -> Vec<i32> {
        h.ent_state
            .cl_parse_entities
            .run(frame.parse_entities, frame.num_entities)
            .unwrap()
            .iter()
            .map(|s| s.number)
            .collect()
    }

    #[test]
    fn test_entity_bits_reject_out_of_range_number() {
        let mut sb = SizeBuf::new(16);
        msg_write_entity_header(&mut sb, U_ORIGIN1, MAX_EDICTS as i32);
        let mut msg = SizeBuf::from_message(sb.as_slice());
        let mut stats = ParseStats::default();

        let err = cl_parse_entity_bits(&mut msg, &mut stats).unwrap_err();
        assert_eq!(err, ParseError::BadEntityNumber { number: 8192, max: 8192 });
        assert!(err.is_protocol_violation());
        assert_eq!(stats.bitcounts, [0; 32]);
    }

    #[test]
    fn test_entity_bits_morebits_and_counts() {
        let mut sb = SizeBuf::new(16);
        msg_write_entity_header(&mut sb, U_ORIGIN1 | UpdateBits::SOLID, 300);
        let mut msg = SizeBuf::from_message(sb.as_slice());
        let mut stats = ParseStats::default();

        let (num, bits) = cl_parse_entity_bits(&mut msg, &mut stats).unwrap();
        assert_eq!(num, 300);
        assert!(bits.contains(U_ORIGIN1 | UpdateBits::SOLID | U_NUMBER16));
        assert_eq!(stats.bitcounts[0], 1);
        assert_eq!(stats.bitcounts[27], 1);
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_packet_entities_from_baselines_when_no_old_frame() {
        let mut h = Harness::new(PROTOCOL_VERSION);
        h.ent_state.cl_entities[4].baseline = ent(4, 2, 8.0);

        let mut sb = SizeBuf::new(256);
        let mut moved = ent(4, 2, 16.0);
        moved.old_origin = [8.0, 0.0, 0.0];
        msg_write_delta_entity(&h.ent_state.cl_entities[4].baseline, &moved, &mut sb, true, false, PROTOCOL_VERSION);
        end_packet_entities(&mut sb);

        let mut frame = Frame { serverframe: 1, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(None, &mut frame, &mut h.ent_state, PROTOCOL_VERSION, 0, &mut h.stats, &mut msg)
            .unwrap();

        assert_eq!(frame.num_entities, 1);
        let decoded = *h.ent_state.cl_parse_entities.get(frame.parse_entities).unwrap();
        assert_eq!(decoded.origin, [16.0, 0.0, 0.0]);
        assert_eq!(decoded.old_origin, [8.0, 0.0, 0.0]);
    }

    #[test]
    fn test_merge_tie_break_order() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        for n in 1..=8 {
            h.ent_state.cl_entities[n as usize].baseline = ent(n, n, 0.0);
        }

        // old frame: 1 3 5 6
        let mut sb = SizeBuf::new(512);
        for n in [1, 3, 5, 6] {
            let base = h.ent_state.cl_entities[n as usize].baseline;
            let mut to = ent(n, n, n as f32 * 10.0);
            to.old_origin = base.origin;
            msg_write_delta_entity(&base, &to, &mut sb, true, false, protocol);
        }
        end_packet_entities(&mut sb);
        let mut old = Frame { serverframe: 1, valid: true, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(None, &mut old, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg).unwrap();
        assert_eq!(frame_numbers(&h, &old), vec![1, 3, 5, 6]);
        let old_states = h.ent_state.cl_parse_entities.run(old.parse_entities, old.num_entities).unwrap();

        // new frame: 2 (new), remove 3, 5 (delta), 7 (new); 1 and 6 carry over
        let mut sb = SizeBuf::new(512);
        let mut two = ent(2, 2, 20.0);
        two.old_origin = [0.0; 3];
        msg_write_delta_entity(&h.ent_state.cl_entities[2].baseline, &two, &mut sb, true, false, protocol);
        msg_write_entity_header(&mut sb, U_REMOVE, 3);
        let mut five = old_states[2];
        five.origin[1] = 4.0;
        five.old_origin = old_states[2].origin;
        msg_write_delta_entity(&old_states[2], &five, &mut sb, false, false, protocol);
        let mut seven = ent(7, 7, 70.0);
        seven.old_origin = [0.0; 3];
        msg_write_delta_entity(&h.ent_state.cl_entities[7].baseline, &seven, &mut sb, true, false, protocol);
        end_packet_entities(&mut sb);

        let mut new = Frame { serverframe: 2, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(Some(&old), &mut new, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg)
            .unwrap();

        let states = h.ent_state.cl_parse_entities.run(new.parse_entities, new.num_entities).unwrap();
        assert_eq!(states.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2, 5, 6, 7]);

        // unchanged copies keep every field but move old_origin up
        let mut one = old_states[0];
        one.old_origin = one.origin;
        assert_eq!(states[0], one);
        assert_eq!(states[1], two);
        assert_eq!(states[2], five);
        assert_eq!(states[3].origin, old_states[3].origin);
        assert_eq!(states[4], seven);
        assert_eq!(h.stats.soft_warnings, 0);
    }

    #[test]
    fn test_merge_with_empty_new_list_copies_everything() {
        let protocol = PROTOCOL_R97_VERSION;
        let mut h = Harness::new(protocol);

        let mut sb = SizeBuf::new(256);
        for n in [10, 20] {
            let to = ent(n, 1, 8.0);
            msg_write_delta_entity(&EntityState::default(), &to, &mut sb, true, true, protocol);
        }
        end_packet_entities(&mut sb);
        let mut old = Frame { serverframe: 1, valid: true, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(None, &mut old, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg).unwrap();

        let mut sb = SizeBuf::new(16);
        end_packet_entities(&mut sb);
        let mut new = Frame { serverframe: 2, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(Some(&old), &mut new, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg)
            .unwrap();

        assert_eq!(frame_numbers(&h, &new), vec![10, 20]);
        // both were in the previous frame, so they interpolate
        assert_eq!(h.ent_state.cl_entities[10].serverframe, 2);
        assert_eq!(h.ent_state.cl_entities[10].prev.origin, [8.0, 0.0, 0.0]);
    }

    #[test]
    fn test_merge_disjoint_lists() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        h.ent_state.cl_entities[9].baseline = ent(9, 3, 1.0);

        let mut sb = SizeBuf::new(256);
        msg_write_delta_entity(&EntityState::default(), &ent(5, 1, 2.0), &mut sb, true, false, protocol);
        end_packet_entities(&mut sb);
        let mut old = Frame { serverframe: 1, valid: true, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(None, &mut old, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg).unwrap();

        let mut sb = SizeBuf::new(256);
        msg_write_entity_header(&mut sb, U_ORIGIN2, 9);
        q2snap_common::common::msg_write_float(&mut sb, 5.0);
        end_packet_entities(&mut sb);
        let mut new = Frame { serverframe: 2, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(Some(&old), &mut new, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg)
            .unwrap();

        let states = h.ent_state.cl_parse_entities.run(new.parse_entities, new.num_entities).unwrap();
        assert_eq!(states.iter().map(|s| s.number).collect::<Vec<_>>(), vec![5, 9]);
        assert_eq!(states[1].modelindex, 3);
        assert_eq!(states[1].origin, [1.0, 5.0, 0.0]);
    }

    #[test]
    fn test_remove_mismatch_is_soft_and_advances() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);

        let mut sb = SizeBuf::new(256);
        for n in [4, 8] {
            msg_write_delta_entity(&EntityState::default(), &ent(n, 1, 0.0), &mut sb, true, false, protocol);
        }
        end_packet_entities(&mut sb);
        let mut old = Frame { serverframe: 1, valid: true, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(None, &mut old, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg).unwrap();

        // remove 6: 4 carries over, then the old pointer skips 8 anyway
        let mut sb = SizeBuf::new(16);
        msg_write_entity_header(&mut sb, U_REMOVE, 6);
        end_packet_entities(&mut sb);
        let mut new = Frame { serverframe: 2, ..Default::default() };
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_packet_entities(Some(&old), &mut new, &mut h.ent_state, protocol, 0, &mut h.stats, &mut msg)
            .unwrap();

        assert_eq!(frame_numbers(&h, &new), vec![4]);
        assert_eq!(h.stats.soft_warnings, 1);
    }

    #[test]
    fn test_reseed_when_absent_from_previous_frame() {
        let mut ce = CEntity::default();
        let mut state = ent(3, 1, 100.0);
        state.old_origin = [90.0, 0.0, 0.0];

        cl_update_centity(&mut ce, &state, 10);
        assert_eq!(ce.serverframe, 10);
        assert_eq!(ce.current, state);
        assert_eq!(ce.trailcount, 1024);
        let mut expected = state;
        expected.origin = state.old_origin;
        assert_eq!(ce.prev, expected);
        assert_eq!(ce.lerp_origin, state.old_origin);

        // present in the next frame: the pair shuffles
        let mut next = ent(3, 1, 110.0);
        next.old_origin = state.origin;
        cl_update_centity(&mut ce, &next, 11);
        assert_eq!(ce.prev, state);
        assert_eq!(ce.current, next);
    }

    #[test]
    fn test_reseed_after_teleport_uses_new_origin() {
        let mut ce = CEntity::default();
        cl_update_centity(&mut ce, &ent(3, 1, 0.0), 10);

        let mut jumped = ent(3, 1, 0.0);
        jumped.origin = [4000.0, 0.0, 0.0];
        jumped.event = EV_OTHER_TELEPORT;
        cl_update_centity(&mut ce, &jumped, 11);
        assert_eq!(ce.prev, jumped);
        assert_eq!(ce.lerp_origin, jumped.origin);
    }

    #[test]
    fn test_large_move_or_model_change_breaks_lerp() {
        let mut ce = CEntity::default();
        cl_update_centity(&mut ce, &ent(3, 1, 0.0), 10);

        let mut far = ent(3, 1, 600.0);
        far.old_origin = [0.0; 3];
        cl_update_centity(&mut ce, &far, 11);
        assert_eq!(ce.prev.origin, [0.0; 3]);
        assert_eq!(ce.trailcount, 1024);

        ce.trailcount = 5;
        let mut swapped = far;
        swapped.modelindex = 2;
        swapped.old_origin = far.origin;
        cl_update_centity(&mut ce, &swapped, 12);
        assert_eq!(ce.trailcount, 1024);
    }

    #[test]
    fn test_huge_or_non_finite_jump_breaks_lerp() {
        let mut ce = CEntity::default();
        cl_update_centity(&mut ce, &ent(3, 1, 0.0), 10);

        ce.trailcount = 5;
        let mut flung = ent(3, 1, -3.0e9);
        flung.old_origin = [0.0; 3];
        cl_update_centity(&mut ce, &flung, 11);
        assert_eq!(ce.trailcount, 1024);
        assert_eq!(ce.prev.origin, [0.0; 3]);

        ce.trailcount = 5;
        let mut broken = flung;
        broken.origin = [f32::NAN, 0.0, 0.0];
        cl_update_centity(&mut ce, &broken, 12);
        assert_eq!(ce.trailcount, 1024);
        assert_eq!(ce.serverframe, 12);
    }

    #[test]
    fn test_playerstate_origin_and_view() {
        let protocol = PROTOCOL_VERSION;
        let mut to = PlayerState::default();
        to.viewangles = [0.0, 90.0, 0.0];
        to.viewoffset = [0.0, 0.0, 22.0];
        to.fov = 90.0;
        to.stats[1] = 100;
        let origin = [800, -1600, 64];

        let mut sb = SizeBuf::new(256);
        msg_write_delta_playerstate(&PlayerState::default(), &[0; 3], &to, &origin, &mut sb, protocol);
        let mut msg = SizeBuf::from_message(sb.as_slice());

        let mut frame = Frame::default();
        let mut stats = ParseStats::default();
        cl_parse_playerstate(None, &mut frame, false, protocol, &mut stats, &mut msg).unwrap();
        assert_eq!(frame.origin, origin);
        assert_eq!(frame.playerstate.viewangles, [0.0, 90.0, 0.0]);
        assert_eq!(frame.playerstate.viewoffset, [0.0, 0.0, 22.0]);
        assert_eq!(frame.playerstate.fov, 90.0);
        assert_eq!(frame.playerstate.stats[1], 100);
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_playerstate_legacy_stats_single_bit() {
        let mut old = Frame::default();
        old.playerstate.stats = [7; MAX_STATS];

        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0); // no other fields
        msg_write_long(&mut sb, 0b1);
        msg_write_short(&mut sb, 42);
        let mut msg = SizeBuf::from_message(sb.as_slice());

        let mut frame = Frame::default();
        let mut stats = ParseStats::default();
        cl_parse_playerstate(Some(&old), &mut frame, false, PROTOCOL_R97_VERSION, &mut stats, &mut msg).unwrap();
        assert_eq!(frame.playerstate.stats[0], 42);
        assert!(frame.playerstate.stats[1..].iter().all(|&s| s == 7));
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_playerstate_extra_stats_are_consumed_and_dropped() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0);
        msg_write_byte(&mut sb, 40); // stat count
        msg_write_long(&mut sb, 1 << 2);
        msg_write_long(&mut sb, 1 << 3); // stat 35
        msg_write_short(&mut sb, 5);
        msg_write_short(&mut sb, 9);
        let mut msg = SizeBuf::from_message(sb.as_slice());

        let mut frame = Frame::default();
        let mut stats = ParseStats::default();
        cl_parse_playerstate(None, &mut frame, false, PROTOCOL_VERSION, &mut stats, &mut msg).unwrap();
        assert_eq!(frame.playerstate.stats[2], 5);
        assert_eq!(stats.soft_warnings, 1);
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_playerstate_pickup_string_is_remapped() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0);
        msg_write_long(&mut sb, 1 << STAT_PICKUP_STRING);
        msg_write_short(&mut sb, 1568); // legacy CS_GENERAL
        let mut msg = SizeBuf::from_message(sb.as_slice());

        let mut frame = Frame::default();
        let mut stats = ParseStats::default();
        cl_parse_playerstate(None, &mut frame, false, PROTOCOL_R97_VERSION, &mut stats, &mut msg).unwrap();
        assert_eq!(frame.playerstate.stats[STAT_PICKUP_STRING] as usize, CS_GENERAL);
    }

    #[test]
    fn test_attractloop_freezes_player() {
        let mut sb = SizeBuf::new(64);
        msg_write_short(&mut sb, 0);
        msg_write_long(&mut sb, 0);
        let mut msg = SizeBuf::from_message(sb.as_slice());
        let mut frame = Frame::default();
        let mut stats = ParseStats::default();
        cl_parse_playerstate(None, &mut frame, true, PROTOCOL_R97_VERSION, &mut stats, &mut msg).unwrap();
        assert_eq!(frame.playerstate.pmove.pm_type, PmType::Freeze);
    }

    #[test]
    fn test_parse_frame_stores_and_queues() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        let mut sb = SizeBuf::new(512);
        write_frame(&mut sb, 5, 0, protocol, |sb| {
            msg_write_delta_entity(&EntityState::default(), &ent(3, 1, 4.0), sb, true, false, protocol);
        });
        let mut msg = SizeBuf::from_message(sb.as_slice());
        h.cls.demo_waiting = true;

        cl_parse_frame(&mut h.ctx(), &mut msg).unwrap();
        assert!(h.cl.frame.valid);
        assert_eq!(h.cl.frame.servertime, 500);
        assert_eq!(h.cl.frames.slot(5).serverframe, 5);
        assert_eq!(h.cl.pending_frames.len(), 1);
        assert!(!h.cls.demo_waiting);
        assert_eq!(h.cl.time, 400);
        // nothing is published yet
        assert_eq!(h.cls.state, ConnState::Connected);
    }

    #[test]
    fn test_parse_frame_requires_playerinfo() {
        let mut h = Harness::new(PROTOCOL_VERSION);
        let mut sb = SizeBuf::new(64);
        msg_write_long(&mut sb, 1);
        msg_write_long(&mut sb, 0);
        msg_write_byte(&mut sb, 0); // surpress count
        msg_write_byte(&mut sb, 0); // areabits
        msg_write_byte(&mut sb, SVC_PACKETENTITIES);
        let mut msg = SizeBuf::from_message(sb.as_slice());

        let err = cl_parse_frame(&mut h.ctx(), &mut msg).unwrap_err();
        assert_eq!(err, ParseError::NotPlayerInfo { cmd: SVC_PACKETENTITIES });
        assert!(h.cl.pending_frames.is_empty());
    }

    #[test]
    fn test_stale_delta_window_marks_frame_invalid() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::with_pool(protocol, 64, 8);

        let mut sb = SizeBuf::new(512);
        write_frame(&mut sb, 1, 0, protocol, |sb| {
            for n in 1..=3 {
                msg_write_delta_entity(&EntityState::default(), &ent(n, 1, 0.0), sb, true, false, protocol);
            }
        });
        cl_parse_frame(&mut h.ctx(), &mut SizeBuf::from_message(sb.as_slice())).unwrap();
        assert!(h.cl.frame.valid);

        // other traffic pushes frame 1's entities out of the safe window
        for _ in 0..60 {
            h.ent_state.cl_parse_entities.push(EntityState::default());
        }

        let mut sb = SizeBuf::new(512);
        write_frame(&mut sb, 2, 1, protocol, |sb| {
            msg_write_entity_header(sb, U_ORIGIN2, 2);
            q2snap_common::common::msg_write_float(sb, 9.0);
        });
        let mut msg = SizeBuf::from_message(sb.as_slice());
        cl_parse_frame(&mut h.ctx(), &mut msg).unwrap();

        assert!(!h.cl.frame.valid);
        assert_eq!(h.stats.stale_deltas, 1);
        assert_eq!(msg.remaining(), 0);
        // decoded against the baseline, and nothing from frame 1 carried over
        assert_eq!(frame_numbers(&h, &h.cl.frame.clone()), vec![2]);

        // a later delta from the invalid frame is refused too
        let mut sb = SizeBuf::new(512);
        write_frame(&mut sb, 3, 2, protocol, |_| {});
        cl_parse_frame(&mut h.ctx(), &mut SizeBuf::from_message(sb.as_slice())).unwrap();
        assert!(!h.cl.frame.valid);
        assert_eq!(h.stats.stale_deltas, 2);
    }

    #[test]
    fn test_delta_from_overwritten_history_slot() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        for serverframe in [1, 17] {
            let mut sb = SizeBuf::new(64);
            write_frame(&mut sb, serverframe, 0, protocol, |_| {});
            cl_parse_frame(&mut h.ctx(), &mut SizeBuf::from_message(sb.as_slice())).unwrap();
        }

        // frame 1 shared a slot with frame 17
        let mut sb = SizeBuf::new(64);
        write_frame(&mut sb, 18, 1, protocol, |_| {});
        cl_parse_frame(&mut h.ctx(), &mut SizeBuf::from_message(sb.as_slice())).unwrap();
        assert!(!h.cl.frame.valid);
        assert_eq!(h.stats.stale_deltas, 1);
    }

    #[test]
    fn test_publish_fires_events_and_activates() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        h.cl.refresh_prepped = true;
        h.cl.servercount = 3;

        let mut sb = SizeBuf::new(512);
        write_frame(&mut sb, 1, 0, protocol, |sb| {
            let mut stepping = ent(3, 1, 0.0);
            stepping.event = EV_FOOTSTEP;
            msg_write_delta_entity(&EntityState::default(), &stepping, sb, true, false, protocol);
            let mut pad = ent(4, 1, 0.0);
            pad.effects = EF_TELEPORTER;
            msg_write_delta_entity(&EntityState::default(), &pad, sb, true, false, protocol);
        });
        cl_parse_frame(&mut h.ctx(), &mut SizeBuf::from_message(sb.as_slice())).unwrap();

        let frame = h.cl.pending_frames.pop().unwrap();
        cl_publish_frame(&mut h.ctx(), &frame).unwrap();

        assert_eq!(h.cls.state, ConnState::Active);
        assert!(h.cl.sound_prepped);
        assert_eq!(h.callbacks.entity_events, vec![3]);
        assert_eq!(h.callbacks.teleporters, vec![4]);
        assert_eq!(h.callbacks.loading_plaques_ended, 1);
        assert_eq!(h.callbacks.prediction_checks, 1);
    }

    #[test]
    fn test_publish_skips_prediction_when_disabled() {
        let protocol = PROTOCOL_VERSION;
        let mut h = Harness::new(protocol);
        h.settings.predict = false;
        let frame = Frame { valid: true, ..Default::default() };
        cl_publish_frame(&mut h.ctx(), &frame).unwrap();
        assert_eq!(h.callbacks.prediction_checks, 0);

        h.settings.predict = true;
        let mut frame = Frame { valid: true, ..Default::default() };
        frame.playerstate.pmove.pm_flags = PMF_NO_PREDICTION;
        cl_publish_frame(&mut h.ctx(), &frame).unwrap();
        assert_eq!(h.callbacks.prediction_checks, 0);
    }

    fn connected_session(protocol: i32) -> (ClientProtocolState, RecordingCallbacks) {
        let mut state = ClientProtocolState::new(ClientConfig { pool_capacity: 1024, pool_margin: 16 });
        let mut callbacks = RecordingCallbacks::default();
        state.cl_client_connect();

        let mut sb = SizeBuf::new(128);
        msg_write_byte(&mut sb, SVC_SERVERDATA);
        msg_write_long(&mut sb, protocol);
        msg_write_long(&mut sb, i32::MAX);
        msg_write_byte(&mut sb, 0);
        msg_write_string(&mut sb, "baseq2");
        msg_write_short(&mut sb, 0);
        msg_write_string(&mut sb, "The Edge");
        state.cl_parse_message(sb.as_slice(), &mut callbacks).unwrap();
        (state, callbacks)
    }

    fn frame_message(serverframe: i32, deltaframe: i32, from: &EntityState, to: &EntityState, protocol: i32) -> Vec<u8> {
        let mut sb = SizeBuf::new(512);
        msg_write_byte(&mut sb, SVC_FRAME);
        write_frame(&mut sb, serverframe, deltaframe, protocol, |sb| {
            msg_write_delta_entity(from, to, sb, true, deltaframe <= 0, protocol);
        });
        sb.as_slice().to_vec()
    }

    #[test]
    fn test_extreme_frame_numbers_are_decoded() {
        let protocol = PROTOCOL_VERSION;
        let (mut state, mut callbacks) = connected_session(protocol);
        let base = EntityState::default();
        let moved = ent(3, 1, 8.0);

        for serverframe in [-21474836, -21474836] {
            let message = frame_message(serverframe, 0, &base, &moved, protocol);
            state.cl_parse_message(&message, &mut callbacks).unwrap();
            assert_eq!(state.cl.time, state.cl.frame.servertime);
        }

        // sequence wrap: a delta across i32::MAX to i32::MIN still resolves
        let message = frame_message(i32::MAX, 0, &base, &moved, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        let mut next = moved;
        next.origin[1] = 16.0;
        let message = frame_message(i32::MIN, i32::MAX, &moved, &next, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        assert!(state.cl.frame.valid);
        assert_eq!(state.ent_state.cl_entities[3].serverframe, i32::MIN);
        assert_eq!(state.ent_state.cl_entities[3].current.origin, [8.0, 16.0, 0.0]);

        // a negative delta is an uncompressed frame
        let message = frame_message(-5, -1_000_000, &base, &moved, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        assert!(state.cl.frame.valid);

        // slot 7 never held frame 7
        let message = frame_message(41, 7, &base, &moved, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        assert!(!state.cl.frame.valid);
        assert_eq!(state.stats.stale_deltas, 1);
        assert_eq!(state.cls.state, ConnState::Active);
    }

    #[test]
    fn test_extreme_coordinates_are_decoded() {
        let protocol = PROTOCOL_VERSION;
        let (mut state, mut callbacks) = connected_session(protocol);

        let mut far = ent(3, 1, 3.0e9);
        far.origin[1] = -3.0e9;
        let message = frame_message(1, 0, &EntityState::default(), &far, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();

        state.ent_state.cl_entities[3].trailcount = 5;
        let mut broken = far;
        broken.origin = [-3.0e9, f32::INFINITY, f32::NAN];
        let message = frame_message(2, 1, &far, &broken, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        assert_eq!(state.ent_state.cl_entities[3].trailcount, 1024);

        let back = ent(3, 1, 0.0);
        let message = frame_message(3, 2, &broken, &back, protocol);
        state.cl_parse_message(&message, &mut callbacks).unwrap();
        assert_eq!(state.ent_state.cl_entities[3].current.origin, [0.0; 3]);
        assert_eq!(state.cls.state, ConnState::Active);
    }
}
