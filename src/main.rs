#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use {defmt_rtt as _, panic_probe as _};

use base_embassy::{
    drivers::{bno055::BNO055_ADDRESS_A, Bno055},
    ipc::FrameBus,
    tasks::{control_task, halt, stats_task, Controller, STATS},
    Board,
};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting base-embassy encoder/IMU bridge");

    let mut board = match Board::init() {
        Ok(board) => board,
        Err(e) => {
            error!("Board init failed: {:?}", e);
            halt().await;
            return;
        }
    };
    let mut params = board.load_params();

    let imu = Bno055::new(board.i2c, BNO055_ADDRESS_A);
    let bus = FrameBus::new(board.host_tx);

    match Controller::start(imu, board.encoders, bus, &mut params, &STATS).await {
        Ok(ctrl) => {
            if let Err(e) = spawner.spawn(stats_task(&STATS)) {
                warn!("Stats task not spawned: {:?}", e);
            }
            match spawner.spawn(control_task(ctrl)) {
                Ok(()) => info!("Control task spawned"),
                Err(e) => {
                    error!("Control task not spawned: {:?}", e);
                    halt().await;
                }
            }
        }
        Err(e) => {
            error!("Startup failed: {:?}", e);
            halt().await;
        }
    }
}
