//! Main hexapod executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Initialise the state controller and boundary adapters
//!     - Main loop at the configured control period:
//!         - Sensor frame acquisition (IMU, joint states, tip forces)
//!         - Telecommand processing and handling
//!         - State controller tick (transitions or the running pipeline)
//!         - Servo demand publication
//!         - Telemetry publication and archiving

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use hex_lib::{
    params::HexParams, sens_client::SensClient, servo_client::ServoClient,
    state_ctrl::StateController, tc_processor, tc_server::TcServer, tc_server::TcServerError,
    tm_server::{TmFrame, TmServer},
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    raise_error,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

use comms_if::net::NetParams;
use comms_if::tc::TcResponse;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Limit of consecutive servo client errors before the exec gives up on the
/// cycle and logs an error.
const MAX_SERVO_ERROR_LIMIT: u64 = 5;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    None,
    Remote(TcServer),
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    let session = Session::new("hex_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("Hexapod Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let hex_params =
        HexParams::load("config/hexapod.toml").wrap_err("Could not load hexapod params")?;
    let net_params: NetParams =
        util::params::load("config/net.toml").wrap_err("Could not load net params")?;

    let cycle_period_s = hex_params.control.time_delta;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    let mut tc_source = TcSource::None;
    let mut use_tc_server = false;

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    if args.len() == 2 {
        info!("Loading script from \"{}\"", &args[1]);

        let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

        info!(
            "Loaded script lasts {:.02} s and contains {} TCs\n",
            si.get_duration(),
            si.get_num_tcs()
        );

        tc_source = TcSource::Script(si);
    } else if args.len() == 1 {
        info!("No script provided, remote control via the TcServer will be used\n");
        use_tc_server = true;
    } else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}",
            args.len() - 1
        ));
    }

    // ---- INITIALISE STATE CONTROLLER ----

    info!("Initialising the state controller...");

    let mut sc =
        StateController::new(hex_params).wrap_err("Failed to initialise the StateController")?;
    sc.init_model(false);

    info!("State controller initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    if use_tc_server {
        tc_source = TcSource::Remote(
            TcServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TcServer")?,
        );
        info!("TcServer initialised");
    }

    let servo_client = {
        let c = ServoClient::new(
            &zmq_ctx,
            &net_params,
            sc.model(),
            sc.params().control.interface_setup_speed,
        )
        .wrap_err("Failed to initialise the ServoClient")?;
        info!("ServoClient initialised");
        c
    };

    let sens_client = {
        let c = SensClient::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise the SensClient")?;
        info!("SensClient initialised");
        c
    };

    let tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- INITIALISE ARCHIVES ----

    let mut leg_state_archive = Archiver::from_path(&session, "leg_states.csv")
        .map_err(|e| eyre!("Failed to create the leg state archive: {}", e))?;

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let mut num_cycles: u64 = 0;
    let mut num_consec_cycle_overruns: u64 = 0;
    let mut num_consec_servo_errors: u64 = 0;
    let mut waiting_for_joints_logged = false;

    loop {
        let cycle_start_instant = Instant::now();

        // ---- SENSOR INPUT ----

        for frame in sens_client.latest_frames() {
            if let Some(ref imu) = frame.imu {
                sc.imu_input(imu);
            }
            if let Some(ref joint_states) = frame.joint_states {
                sc.joint_states_input(joint_states);
            }
            if let Some(ref tip_forces) = frame.tip_forces {
                sc.tip_force_input(tip_forces);
            }
        }

        if !sc.joint_positions_initialised() && !waiting_for_joints_logged {
            info!("Waiting for the joint state bus to report every joint...");
            waiting_for_joints_logged = true;
        }

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::None => raise_error!("No TC source present"),

            TcSource::Remote(ref server) => loop {
                match server.receive_tc() {
                    Ok(Some(tc)) => {
                        tc_processor::exec(&mut sc, &tc);
                        if let Err(e) = server.send_response(TcResponse::Ok) {
                            warn!("Could not respond to TC: {}", e);
                        }
                    }
                    Ok(None) => break,
                    Err(TcServerError::TcParseError(e)) => {
                        warn!("Could not parse received TC: {}", e);
                        break;
                    }
                    Err(e) => {
                        warn!("TC receive error: {}", e);
                        break;
                    }
                }
            },

            TcSource::Script(ref mut si) => match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&mut sc, tc);
                    }
                }
                // Exit if end of script reached
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached, stopping");
                    break;
                }
            },
        }

        // ---- CONTROL PROCESSING ----

        if let Err(e) = sc.tick() {
            error!("{}", e);
            return Err(e).wrap_err("Unrecoverable state controller error");
        }

        // ---- SERVO DEMANDS ----

        match servo_client.send_demands(&sc.servo_demands()) {
            Ok(_) => {
                num_consec_servo_errors = 0;
            }
            Err(e) => {
                num_consec_servo_errors += 1;
                if num_consec_servo_errors == MAX_SERVO_ERROR_LIMIT {
                    error!(
                        "Maximum number of consecutive ServoClient errors ({}) reached: {}",
                        MAX_SERVO_ERROR_LIMIT, e
                    );
                }
            }
        }

        // ---- TELEMETRY ----

        let time_s = session::get_elapsed_seconds();

        match tm_server.send(&TmFrame::from_controller(&sc, time_s)) {
            Ok(_) => (),
            Err(e) => warn!("TmServer error: {}", e),
        }

        for record in sc.leg_state_records(time_s) {
            if let Err(e) = leg_state_archive.serialise(record) {
                warn!("Could not archive leg state: {}", e);
                break;
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > 500 {
                    raise_error!("More than 500 consecutive cycle overruns!");
                }
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution after {} cycles", num_cycles);

    Ok(())
}
