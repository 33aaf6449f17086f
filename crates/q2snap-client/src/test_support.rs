// test_support.rs -- fixtures shared by the decoder tests

use q2snap_common::common::{
    msg_write_byte, msg_write_delta_playerstate, msg_write_long, msg_write_short,
};
use q2snap_common::q_shared::{EntityState, PlayerState};
use q2snap_common::qcommon::{
    SizeBuf, PROTOCOL_RELEASE_VERSION, SVC_PACKETENTITIES, SVC_PLAYERINFO,
};

use crate::cl_tent::TempEntity;
use crate::client::*;

/// Records every collaborator call. Registration hands out increasing
/// nonzero handles, except for names listed in `missing`.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    next_handle: i32,
    pub missing: Vec<String>,
    pub registered: Vec<String>,

    pub entity_events: Vec<i32>,
    pub teleporters: Vec<i32>,
    pub loading_plaques_ended: u32,
    pub prediction_checks: u32,

    pub sounds: Vec<SoundStart>,
    pub local_sounds: Vec<String>,
    pub tracks: Vec<String>,
    pub center_prints: Vec<String>,
    pub cinematics: Vec<String>,
    pub stufftext: Vec<String>,
    pub lightstyles: Vec<(usize, String)>,
    pub temp_entities: Vec<TempEntity>,
    pub muzzle_flashes: Vec<(i32, i32, bool)>,
    pub muzzle_flashes2: Vec<(i32, i32)>,
    pub downloads: Vec<DownloadChunk>,
}

impl RecordingCallbacks {
    fn handle(&mut self, name: &str) -> i32 {
        if self.missing.iter().any(|m| m == name) {
            return 0;
        }
        self.registered.push(name.to_string());
        self.next_handle += 1;
        self.next_handle
    }

    pub fn was_registered(&self, name: &str) -> bool {
        self.registered.iter().any(|r| r == name)
    }
}

impl ClientCallbacks for RecordingCallbacks {
    fn r_register_model(&mut self, name: &str) -> i32 { self.handle(name) }
    fn r_register_skin(&mut self, name: &str) -> i32 { self.handle(name) }
    fn draw_find_pic(&mut self, name: &str) -> i32 { self.handle(name) }
    fn cm_inline_model(&mut self, name: &str) -> i32 { self.handle(name) }
    fn s_register_sound(&mut self, name: &str) -> i32 { self.handle(name) }

    fn s_start_sound(&mut self, sound: &SoundStart) {
        self.sounds.push(*sound);
    }
    fn s_start_local_sound(&mut self, name: &str) {
        self.local_sounds.push(name.to_string());
    }
    fn ogg_play_track(&mut self, track: &str) {
        self.tracks.push(track.to_string());
    }

    fn scr_center_print(&mut self, text: &str) {
        self.center_prints.push(text.to_string());
    }
    fn scr_play_cinematic(&mut self, name: &str) {
        self.cinematics.push(name.to_string());
    }
    fn scr_end_loading_plaque(&mut self) {
        self.loading_plaques_ended += 1;
    }
    fn cbuf_add_text(&mut self, text: &str) {
        self.stufftext.push(text.to_string());
    }

    fn cl_set_lightstyle(&mut self, index: usize, map: &str) {
        self.lightstyles.push((index, map.to_string()));
    }
    fn cl_entity_event(&mut self, ent: &EntityState) {
        self.entity_events.push(ent.number);
    }
    fn cl_teleporter_particles(&mut self, ent: &EntityState) {
        self.teleporters.push(ent.number);
    }
    fn cl_check_prediction_error(&mut self, _frame: &Frame) {
        self.prediction_checks += 1;
    }
    fn cl_temp_entity(&mut self, te: &TempEntity) {
        self.temp_entities.push(te.clone());
    }
    fn cl_muzzle_flash(&mut self, ent: i32, weapon: i32, silenced: bool) {
        self.muzzle_flashes.push((ent, weapon, silenced));
    }
    fn cl_muzzle_flash2(&mut self, ent: i32, flash: i32) {
        self.muzzle_flashes2.push((ent, flash));
    }
    fn cl_download(&mut self, chunk: &DownloadChunk) {
        self.downloads.push(chunk.clone());
    }
}

/// Decoder state for one connected client, already past svc_serverdata.
pub struct Harness {
    pub cl: ClientState,
    pub cls: ClientStatic,
    pub ent_state: ClientEntState,
    pub stats: ParseStats,
    pub settings: ParseSettings,
    pub callbacks: RecordingCallbacks,
}

impl Harness {
    pub fn new(protocol: i32) -> Self {
        Self::with_pool(protocol, 1024, 16)
    }

    pub fn with_pool(protocol: i32, capacity: usize, margin: usize) -> Self {
        Self {
            cl: ClientState::new(),
            cls: ClientStatic {
                state: ConnState::Connected,
                server_protocol: protocol,
                ..Default::default()
            },
            ent_state: ClientEntState::new(capacity, margin),
            stats: ParseStats::default(),
            settings: ParseSettings { predict: true, vwep: true, ..Default::default() },
            callbacks: RecordingCallbacks::default(),
        }
    }

    pub fn ctx(&mut self) -> ParseContext<'_> {
        ParseContext {
            cl: &mut self.cl,
            cls: &mut self.cls,
            ent_state: &mut self.ent_state,
            stats: &mut self.stats,
            settings: self.settings,
            callbacks: &mut self.callbacks,
        }
    }
}

/// Terminates a packetentities block.
pub fn end_packet_entities(sb: &mut SizeBuf) {
    msg_write_short(sb, 0);
}

/// Writes the body of an svc_frame (without the opcode) carrying an
/// unchanged player state. `entities` writes the entity deltas.
pub fn write_frame<F: FnOnce(&mut SizeBuf)>(
    sb: &mut SizeBuf,
    serverframe: i32,
    deltaframe: i32,
    protocol: i32,
    entities: F,
) {
    msg_write_long(sb, serverframe);
    msg_write_long(sb, deltaframe);
    if protocol != PROTOCOL_RELEASE_VERSION {
        msg_write_byte(sb, 0); // surpress count
    }
    msg_write_byte(sb, 0); // areabits

    msg_write_byte(sb, SVC_PLAYERINFO);
    let ps = PlayerState::default();
    msg_write_delta_playerstate(&ps, &[0; 3], &ps, &[0; 3], sb, protocol);

    msg_write_byte(sb, SVC_PACKETENTITIES);
    entities(sb);
    end_packet_entities(sb);
}
