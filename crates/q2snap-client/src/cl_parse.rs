// cl_parse.rs -- parse a message received from the server

use q2snap_common::common::{
    com_dprintf, com_printf, msg_read_byte, msg_read_cmd, msg_read_data, msg_read_long,
    msg_read_pos, msg_read_short, msg_read_string,
};
use q2snap_common::q_shared::{
    EntityState, CS_AIRACCEL, CS_CDTRACK, CS_GENERAL, CS_IMAGES, CS_ITEMS, CS_LIGHTS,
    CS_MODELS, CS_PLAYERSKINS, CS_SKIP, CS_SOUNDS, MAX_CLIENTS, MAX_CONFIGSTRINGS, MAX_EDICTS,
    MAX_IMAGES, MAX_ITEMS, MAX_LIGHTSTYLES, MAX_MODELS, MAX_QPATH, MAX_SOUNDS,
    MAX_STRING_CHARS, MZ_SILENCED, PRINT_CHAT,
};
use q2snap_common::qcommon::{
    is_qii97_protocol, protocol_name, protocol_supported, SizeBuf, SoundFlags, SvcOps,
    DEFAULT_SOUND_PACKET_ATTENUATION, DEFAULT_SOUND_PACKET_VOLUME, PROTOCOL_RR22_VERSION,
    PROTOCOL_RR23_VERSION, PROTOCOL_VERSION, SND_ATTENUATION, SND_ENT, SND_OFFSET, SND_POS,
    SND_VOLUME,
};

use crate::cl_delta::cl_parse_delta;
use crate::cl_ents::{cl_parse_entity_bits, cl_parse_frame, cl_publish_frame};
use crate::cl_main::cl_clear_state;
use crate::cl_tent::cl_parse_tent;
use crate::client::*;
use crate::error::{ParseError, ParseResult};

pub static SVC_STRINGS: [&str; 21] = [
    "svc_bad",
    "svc_muzzleflash",
    "svc_muzzlflash2",
    "svc_temp_entity",
    "svc_layout",
    "svc_inventory",
    "svc_nop",
    "svc_disconnect",
    "svc_reconnect",
    "svc_sound",
    "svc_print",
    "svc_stufftext",
    "svc_serverdata",
    "svc_configstring",
    "svc_spawnbaseline",
    "svc_centerprint",
    "svc_download",
    "svc_playerinfo",
    "svc_packetentities",
    "svc_deltapacketentities",
    "svc_frame",
];

/// Longest string a server message field may carry.
const MAX_MSG_STRING: usize = MAX_STRING_CHARS - 1;

fn show_net(net_message: &SizeBuf, s: &str, shownet: i32) {
    if shownet >= 2 {
        com_printf(&format!("{:3}:{}\n", net_message.readcount - 1, s));
    }
}

/// Traces an opcode that was just read.
pub fn cl_show_net_cmd(net_message: &SizeBuf, cmd: i32, shownet: i32) {
    if shownet < 2 {
        return;
    }
    match usize::try_from(cmd).ok().and_then(|i| SVC_STRINGS.get(i)) {
        Some(name) => show_net(net_message, name, shownet),
        None => com_printf(&format!("{:3}:BAD CMD {}\n", net_message.readcount - 1, cmd)),
    }
}

// =========================================================================
// CONFIG STRING REMAPPING
// =========================================================================

/// (legacy start, current start, count) for every legacy config string
/// range that has a home in the current layout.
const LEGACY_CONFIGSTRINGS: [(usize, usize, usize); 9] = [
    (0, 0, 29),                // name, cd track, sky, statusbar
    (29, CS_AIRACCEL, 3),      // airaccel, maxclients, map checksum
    (32, CS_MODELS, 256),
    (288, CS_SOUNDS, 256),
    (544, CS_IMAGES, 256),
    (800, CS_LIGHTS, 256),
    (1056, CS_ITEMS, 256),
    (1312, CS_PLAYERSKINS, 256),
    (1568, CS_GENERAL, 512),
];

/// Rerelease slots above this (wheel, cd loop count, game style) are
/// accepted and dropped.
const RR_CONFIGSTRINGS_END: usize = 13120;

/// Maps a config string index as sent by `protocol` into the local
/// layout. Returns -1 for an index with no slot.
pub fn p_convert_config_string_from(index: i32, protocol: i32) -> i32 {
    let Ok(i) = usize::try_from(index) else {
        return -1;
    };

    if is_qii97_protocol(protocol) {
        return LEGACY_CONFIGSTRINGS
            .iter()
            .find(|&&(legacy, _, count)| i >= legacy && i < legacy + count)
            .map_or(-1, |&(legacy, current, _)| (current + i - legacy) as i32);
    }

    match protocol {
        PROTOCOL_RR22_VERSION | PROTOCOL_RR23_VERSION => {
            if i < CS_SKIP {
                index
            } else if i < RR_CONFIGSTRINGS_END {
                CS_SKIP as i32
            } else {
                -1
            }
        }
        PROTOCOL_VERSION if i < MAX_CONFIGSTRINGS => index,
        _ => -1,
    }
}

/// Inverse of `p_convert_config_string_from`, used when writing a demo in
/// the server's own protocol.
pub fn p_convert_config_string_to(index: usize, protocol: i32) -> i32 {
    if is_qii97_protocol(protocol) {
        return LEGACY_CONFIGSTRINGS
            .iter()
            .find(|&&(_, current, count)| index >= current && index < current + count)
            .map_or(-1, |&(legacy, current, _)| (legacy + index - current) as i32);
    }
    if index < CS_SKIP {
        index as i32
    } else {
        -1
    }
}

// =========================================================================
// SERVER CONNECTING MESSAGES
// =========================================================================

/// CL_ParseServerData
pub fn cl_parse_server_data(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    // wipe the client_state_t struct
    cl_clear_state(ctx.cl, ctx.ent_state);
    ctx.cls.state = ConnState::Connected;

    // parse protocol version number
    let protocol = msg_read_long(net_message)?;
    ctx.cls.server_protocol = protocol;
    if !protocol_supported(protocol) {
        return Err(ParseError::UnsupportedProtocol(protocol));
    }
    com_printf(&format!("Network protocol: {}\n", protocol_name(protocol)));

    ctx.cl.servercount = msg_read_long(net_message)?;
    ctx.cl.attractloop = msg_read_byte(net_message)? != 0;

    // game directory
    ctx.cl.gamedir = msg_read_string(net_message, MAX_QPATH - 1);

    // parse player entity number
    ctx.cl.playernum = msg_read_short(net_message)?;

    // get the full level name
    let levelname = msg_read_string(net_message, MAX_QPATH - 1);

    if ctx.cl.playernum == -1 {
        // playing a cinematic or showing a pic, not a level
        ctx.callbacks.scr_play_cinematic(&levelname);
    } else {
        // separate the printfs so the server message can have a color
        com_printf(&format!("\n\n\x1d{}\x1f\n\n", "\x1e".repeat(35)));
        com_printf(&format!("\x02{}\n", levelname));

        // need to prep refresh at next opportunity
        ctx.cl.refresh_prepped = false;
    }

    Ok(())
}

/// CL_ParseBaseline
pub fn cl_parse_baseline(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let nullstate = EntityState::default();
    let (newnum, bits) = cl_parse_entity_bits(net_message, ctx.stats)?;
    let baseline = cl_parse_delta(&nullstate, newnum, bits, ctx.cls.server_protocol, net_message)?;
    ctx.ent_state.cl_entities[newnum as usize].baseline = baseline;
    Ok(())
}

/// CL_LoadClientinfo -- Resolves a "name\model/skin" string into model,
/// skin, icon and view weapon handles, falling back to the male model and
/// the grunt skin.
pub fn cl_load_clientinfo(
    ci: &mut ClientInfo,
    s: &str,
    weapon_models: &[String],
    settings: &ParseSettings,
    callbacks: &mut dyn ClientCallbacks,
) {
    ci.cinfo = qpath(s);

    // isolate the player's name
    let (name, rest) = match ci.cinfo.find('\\') {
        Some(t) => (&ci.cinfo[..t], &ci.cinfo[t + 1..]),
        None => (ci.cinfo.as_str(), ""),
    };
    ci.name = name.to_string();
    let rest = rest.to_string();

    ci.weaponmodel = [0; MAX_CLIENTWEAPONMODELS];

    if settings.noskins || rest.is_empty() {
        ci.model = callbacks.r_register_model("players/male/tris.md2");
        ci.weaponmodel[0] = callbacks.r_register_model("players/male/weapon.md2");
        ci.skin = callbacks.r_register_skin("players/male/grunt.pcx");
        ci.iconname = "/players/male/grunt_i.pcx".to_string();
        ci.icon = callbacks.draw_find_pic(&ci.iconname);
    } else {
        // isolate the model name
        let (mut model_name, skin_name) = match rest.find('/').or_else(|| rest.find('\\')) {
            Some(t) => (rest[..t].to_string(), rest[t + 1..].to_string()),
            None => (String::new(), rest.get(1..).unwrap_or("").to_string()),
        };

        // model file
        ci.model = callbacks.r_register_model(&qpath(&format!("players/{}/tris.md2", model_name)));
        if ci.model == 0 {
            model_name = "male".to_string();
            ci.model = callbacks.r_register_model("players/male/tris.md2");
        }

        // skin file
        ci.skin = callbacks.r_register_skin(&qpath(&format!("players/{}/{}.pcx", model_name, skin_name)));

        // if we don't have the skin and the model wasn't male,
        // see if the male has it (this is for CTF's skins)
        if ci.skin == 0 && !model_name.eq_ignore_ascii_case("male") {
            model_name = "male".to_string();
            ci.model = callbacks.r_register_model("players/male/tris.md2");
            ci.skin = callbacks.r_register_skin(&qpath(&format!("players/male/{}.pcx", skin_name)));
        }

        // if we still don't have a skin, it means that the male model
        // didn't have it, so default to grunt
        if ci.skin == 0 {
            ci.skin = callbacks.r_register_skin(&qpath(&format!("players/{}/grunt.pcx", model_name)));
        }

        // weapon file
        for (i, weapon) in weapon_models.iter().enumerate().take(MAX_CLIENTWEAPONMODELS) {
            ci.weaponmodel[i] = callbacks.r_register_model(&qpath(&format!("players/{}/{}", model_name, weapon)));
            if ci.weaponmodel[i] == 0 && model_name == "cyborg" {
                // try male
                ci.weaponmodel[i] = callbacks.r_register_model(&qpath(&format!("players/male/{}", weapon)));
            }
            if !settings.vwep {
                break; // only one when vwep is off
            }
        }

        // icon file
        ci.iconname = qpath(&format!("/players/{}/{}_i.pcx", model_name, skin_name));
        ci.icon = callbacks.draw_find_pic(&ci.iconname);
    }

    // must have loaded all data types to be valid
    if ci.skin == 0 || ci.icon == 0 || ci.model == 0 || ci.weaponmodel[0] == 0 {
        ci.skin = 0;
        ci.icon = 0;
        ci.model = 0;
        ci.weaponmodel[0] = 0;
    }
}

/// CL_ParseClientinfo -- Load the skin, icon, and model for a client.
pub fn cl_parse_clientinfo(ctx: &mut ParseContext<'_>, player: usize) {
    let cl = &mut *ctx.cl;
    cl_load_clientinfo(
        &mut cl.clientinfo[player],
        &cl.configstrings[CS_PLAYERSKINS + player],
        &cl.weapon_models,
        &ctx.settings,
        ctx.callbacks,
    );
}

/// CL_ParseConfigString
pub fn cl_parse_config_string(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let protocol = ctx.cls.server_protocol;

    let orig = msg_read_short(net_message)? & 0xFFFF;
    let i = p_convert_config_string_from(orig, protocol);
    let s = msg_read_string(net_message, MAX_MSG_STRING);

    if i < 0 || i as usize >= MAX_CONFIGSTRINGS {
        return Err(ParseError::BadConfigString { index: orig, value: s, protocol: protocol_name(protocol) });
    }
    let i = i as usize;

    if i == CS_SKIP {
        ctx.stats.soft_warning(&format!("CL_ParseConfigString: unknown config string {}\n", orig));
        return Ok(());
    }

    // a string may run on into the following slots, but not past the table
    let length = s.len();
    if length > (MAX_CONFIGSTRINGS - i) * MAX_QPATH - 1 {
        return Err(ParseError::OversizeConfigString { index: i });
    }

    let olds = std::mem::replace(&mut ctx.cl.configstrings[i], s);
    let s = ctx.cl.configstrings[i].clone();
    let prepped = ctx.cl.refresh_prepped;

    // do something appropriate
    if (CS_LIGHTS..CS_LIGHTS + MAX_LIGHTSTYLES).contains(&i) {
        ctx.callbacks.cl_set_lightstyle(i - CS_LIGHTS, &s);
    } else if i == CS_CDTRACK {
        if prepped {
            ctx.callbacks.ogg_play_track(&s);
        }
    } else if (CS_MODELS..CS_MODELS + MAX_MODELS).contains(&i) {
        if prepped {
            let n = i - CS_MODELS;
            ctx.cl.model_draw[n] = ctx.callbacks.r_register_model(&s);
            ctx.cl.model_clip[n] = if s.starts_with('*') {
                ctx.callbacks.cm_inline_model(&s)
            } else {
                0
            };
        }
    } else if (CS_SOUNDS..CS_SOUNDS + MAX_SOUNDS).contains(&i) {
        if prepped {
            ctx.cl.sound_precache[i - CS_SOUNDS] = ctx.callbacks.s_register_sound(&s);
        }
    } else if (CS_IMAGES..CS_IMAGES + MAX_IMAGES).contains(&i) {
        if prepped {
            ctx.cl.image_precache[i - CS_IMAGES] = ctx.callbacks.draw_find_pic(&s);
        }
    } else if (CS_PLAYERSKINS..CS_PLAYERSKINS + MAX_CLIENTS).contains(&i) {
        if prepped && olds != s {
            cl_parse_clientinfo(ctx, i - CS_PLAYERSKINS);
        }
    }

    Ok(())
}

// =========================================================================
// ACTION MESSAGES
// =========================================================================

/// CL_ParseStartSoundPacket
pub fn cl_parse_start_sound_packet(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let protocol = ctx.cls.server_protocol;

    let flags = SoundFlags::from_bits_retain(msg_read_byte(net_message)? as u32);
    let sound_num = if is_qii97_protocol(protocol) {
        msg_read_byte(net_message)?
    } else {
        msg_read_short(net_message)?
    };

    let volume = if flags.contains(SND_VOLUME) {
        msg_read_byte(net_message)? as f32 / 255.0
    } else {
        DEFAULT_SOUND_PACKET_VOLUME
    };

    let attenuation = if flags.contains(SND_ATTENUATION) {
        msg_read_byte(net_message)? as f32 / 64.0
    } else {
        DEFAULT_SOUND_PACKET_ATTENUATION
    };

    let timeofs = if flags.contains(SND_OFFSET) {
        msg_read_byte(net_message)? as f32 / 1000.0
    } else {
        0.0
    };

    let (ent, channel) = if flags.contains(SND_ENT) {
        // entity reletive
        let v = msg_read_short(net_message)?;
        let ent = v >> 3;
        if ent < 0 || ent >= MAX_EDICTS as i32 {
            return Err(ParseError::BadSoundEntity { number: ent, max: MAX_EDICTS as i32 });
        }
        (ent, v & 7)
    } else {
        (0, 0)
    };

    // positioned in space
    let pos = if flags.contains(SND_POS) {
        Some(msg_read_pos(net_message, protocol)?)
    } else {
        None
    };

    let Some(&sfx) = usize::try_from(sound_num).ok().and_then(|n| ctx.cl.sound_precache.get(n)) else {
        com_printf(&format!("CL_ParseStartSoundPacket: incorrect sound id {} > MAX_SOUNDS\n", sound_num));
        return Ok(());
    };

    if sfx == 0 {
        return Ok(());
    }

    ctx.callbacks.s_start_sound(&SoundStart { pos, ent, channel, sfx, volume, attenuation, timeofs });
    Ok(())
}

fn read_flash_entity(net_message: &mut SizeBuf) -> ParseResult<i32> {
    let i = msg_read_short(net_message)?;
    if i < 1 || i >= MAX_EDICTS as i32 {
        return Err(ParseError::BadEntityNumber { number: i, max: MAX_EDICTS as i32 });
    }
    Ok(i)
}

/// CL_AddMuzzleFlash
pub fn cl_add_muzzle_flash(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let i = read_flash_entity(net_message)?;
    let weapon = msg_read_byte(net_message)?;
    let silenced = weapon & MZ_SILENCED != 0;
    ctx.callbacks.cl_muzzle_flash(i, weapon & !MZ_SILENCED, silenced);
    Ok(())
}

/// CL_AddMuzzleFlash2 -- monster muzzle flashes
pub fn cl_add_muzzle_flash2(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let ent = read_flash_entity(net_message)?;
    let flash_number = msg_read_byte(net_message)?;
    ctx.callbacks.cl_muzzle_flash2(ent, flash_number);
    Ok(())
}

/// CL_ParseDownload -- A download message has been received from the
/// server.
pub fn cl_parse_download(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    // read the data
    let size = msg_read_short(net_message)?;
    let percent = msg_read_byte(net_message)?;

    if size == -1 {
        com_printf("Server does not have this file.\n");
        ctx.callbacks.cl_download(&DownloadChunk { percent, data: None });
        return Ok(());
    }

    let data = msg_read_data(net_message, size as u16 as usize)?;
    ctx.cls.download_percent = percent;
    ctx.callbacks.cl_download(&DownloadChunk { percent, data: Some(data) });
    Ok(())
}

/// CL_ParseInventory
pub fn cl_parse_inventory(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    for slot in ctx.cl.inventory.iter_mut().take(MAX_ITEMS) {
        *slot = msg_read_short(net_message)?;
    }
    Ok(())
}

// =========================================================================
// REGISTRATION
// =========================================================================

/// CL_RegisterSounds
pub fn cl_register_sounds(cl: &mut ClientState, callbacks: &mut dyn ClientCallbacks) {
    for i in 1..MAX_SOUNDS {
        let name = &cl.configstrings[CS_SOUNDS + i];
        if name.is_empty() {
            break;
        }
        cl.sound_precache[i] = callbacks.s_register_sound(name);
    }
}

/// CL_PrepRefresh -- Registers every model, image and player skin the
/// server has announced so far.
pub fn cl_prep_refresh(cl: &mut ClientState, settings: &ParseSettings, callbacks: &mut dyn ClientCallbacks) {
    if cl.configstrings[CS_MODELS + 1].is_empty() {
        return; // no map loaded
    }

    com_printf(&format!("Map: {}\r", cl.configstrings[CS_MODELS + 1]));

    cl.weapon_models = vec!["weapon.md2".to_string()];

    for i in 1..MAX_MODELS {
        let name = cl.configstrings[CS_MODELS + i].clone();
        if name.is_empty() {
            break;
        }
        if let Some(weapon) = name.strip_prefix('#') {
            // special player weapon model
            if cl.weapon_models.len() < MAX_CLIENTWEAPONMODELS {
                cl.weapon_models.push(qpath(weapon));
            }
        } else {
            cl.model_draw[i] = callbacks.r_register_model(&name);
            cl.model_clip[i] = if name.starts_with('*') {
                callbacks.cm_inline_model(&name)
            } else {
                0
            };
        }
    }

    for i in 1..MAX_IMAGES {
        let name = &cl.configstrings[CS_IMAGES + i];
        if name.is_empty() {
            break;
        }
        cl.image_precache[i] = callbacks.draw_find_pic(name);
    }

    for i in 0..MAX_CLIENTS {
        let cs = &cl.configstrings[CS_PLAYERSKINS + i];
        if cs.is_empty() {
            continue;
        }
        com_printf(&format!("client {}\r", i));
        cl_load_clientinfo(&mut cl.clientinfo[i], cs, &cl.weapon_models, settings, callbacks);
    }

    cl_load_clientinfo(&mut cl.baseclientinfo, "unnamed\\male/grunt", &cl.weapon_models, settings, callbacks);

    com_printf("                                     \r");

    cl.refresh_prepped = true;
    cl.force_refdef = true; // make sure we have a valid refdef

    // start the cd track
    if !cl.configstrings[CS_CDTRACK].is_empty() {
        callbacks.ogg_play_track(&cl.configstrings[CS_CDTRACK]);
    }
}

// =========================================================================
// DISPATCH
// =========================================================================

/// CL_ParseServerMessage -- Runs every command in one server message.
/// Frames decoded along the way are published, and the message is
/// appended to a recording demo, only after the whole message decodes.
pub fn cl_parse_server_message(ctx: &mut ParseContext<'_>, net_message: &mut SizeBuf) -> ParseResult<()> {
    let shownet = ctx.settings.shownet;

    // if recording demos, copy the message out
    if shownet == 1 {
        com_printf(&format!("{} ", net_message.cursize));
    } else if shownet >= 2 {
        com_printf("------------------\n");
    }

    ctx.cl.pending_frames.clear();

    // parse the message
    loop {
        let Some(cmd) = msg_read_cmd(net_message) else {
            show_net(net_message, "END OF MESSAGE", shownet);
            break;
        };

        cl_show_net_cmd(net_message, cmd, shownet);

        // other commands
        match SvcOps::from_i32(cmd) {
            Some(SvcOps::Nop) => {}

            Some(SvcOps::Disconnect) => return Err(ParseError::ServerDisconnected),

            Some(SvcOps::Reconnect) => {
                com_printf("Server disconnected, reconnecting\n");
                ctx.cls.download_percent = 0;
                ctx.cls.state = ConnState::Connecting;
                ctx.cls.connect_time = -99999.0; // CL_CheckForResend() will fire immediately
            }

            Some(SvcOps::Print) => {
                let level = msg_read_byte(net_message)?;
                if level == PRINT_CHAT {
                    ctx.callbacks.s_start_local_sound("misc/talk.wav");
                }
                com_printf(&msg_read_string(net_message, MAX_MSG_STRING));
            }

            Some(SvcOps::CenterPrint) => {
                let s = msg_read_string(net_message, MAX_MSG_STRING);
                ctx.callbacks.scr_center_print(&s);
            }

            Some(SvcOps::StuffText) => {
                let s = msg_read_string(net_message, MAX_MSG_STRING);
                com_dprintf(&format!("stufftext: {}\n", s));
                ctx.callbacks.cbuf_add_text(&s);
            }

            Some(SvcOps::ServerData) => cl_parse_server_data(ctx, net_message)?,

            Some(SvcOps::ConfigString) => cl_parse_config_string(ctx, net_message)?,

            Some(SvcOps::Sound) => cl_parse_start_sound_packet(ctx, net_message)?,

            Some(SvcOps::SpawnBaseline) => cl_parse_baseline(ctx, net_message)?,

            Some(SvcOps::TempEntity) => {
                let te = cl_parse_tent(net_message, ctx.cls.server_protocol)?;
                ctx.callbacks.cl_temp_entity(&te);
            }

            Some(SvcOps::MuzzleFlash) => cl_add_muzzle_flash(ctx, net_message)?,

            Some(SvcOps::MuzzleFlash2) => cl_add_muzzle_flash2(ctx, net_message)?,

            Some(SvcOps::Download) => cl_parse_download(ctx, net_message)?,

            Some(SvcOps::Frame) => cl_parse_frame(ctx, net_message)?,

            Some(SvcOps::Inventory) => cl_parse_inventory(ctx, net_message)?,

            Some(SvcOps::Layout) => {
                ctx.cl.layout = msg_read_string(net_message, MAX_MSG_STRING);
            }

            Some(SvcOps::PlayerInfo | SvcOps::PacketEntities | SvcOps::DeltaPacketEntities) => {
                return Err(ParseError::OutOfPlaceFrameData { cmd });
            }

            Some(SvcOps::Bad) | None => return Err(ParseError::IllegibleServerMessage { cmd }),
        }
    }

    for frame in std::mem::take(&mut ctx.cl.pending_frames) {
        cl_publish_frame(ctx, &frame)?;
    }

    // we don't know if it is ok to save a demo message until
    // after we have parsed the frame
    if !ctx.cls.demo_waiting {
        if let Some(demo) = ctx.cls.demo.as_mut() {
            if let Err(e) = demo.write_message(net_message.as_slice()) {
                com_printf(&format!("Demo write failed: {}. Recording stopped.\n", e));
                ctx.cls.demo = None;
            }
        }
    }

    Ok(())
}
