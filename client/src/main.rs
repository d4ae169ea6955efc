//! 多后端象棋客户端（控制台版）
//!
//! 启动即开一张本地练习桌；设置里配了远程站点时同时登录远端。
//! 命令一行一条，走子用四位数字记法（源列行 + 目标列行）。

mod console;
mod engine;
mod settings;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chess_session::{Session, SiteId, SiteType};
use protocol::{
    Color, Move, Piece, PieceKind, Position, ServerAddress, TimeInfo, PRACTICE_FREE_SECS,
    PRACTICE_GAME_SECS, PRACTICE_MOVE_SECS,
};

use console::ConsoleEnv;
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chess_client=info".parse()?)
                .add_directive("chess_session=info".parse()?),
        )
        .init();

    let settings = Settings::load();
    let mut session = Session::new();

    let local_site = session
        .manager_mut()
        .create_local_site(&settings.player_id, Box::new(ConsoleEnv::new(settings.ai_level)));
    let practice_table = session
        .manager_mut()
        .site_mut(local_site)
        .context("本地站点尚未登记")?
        .open_practice_table()?;
    info!(table = %practice_table, "练习桌已就绪");

    let remote_site = match &settings.remote {
        Some(account) => {
            let site_id = session.manager_mut().create_site(
                SiteType::Remote,
                ServerAddress::new(account.host.clone(), account.port),
                &settings.player_id,
                account.password.clone(),
                Box::new(ConsoleEnv::new(settings.ai_level)),
            );
            session
                .manager_mut()
                .site_mut(site_id)
                .context("远程站点尚未登记")?
                .connect()?;
            Some(site_id)
        }
        None => None,
    };

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    run_loop(&mut session, local_site, remote_site, &practice_table, &mut lines).await?;

    info!("正在退出");
    session.shutdown().await?;
    if let Err(err) = settings.save() {
        warn!(error = %err, "设置未能保存");
    }
    Ok(())
}

async fn run_loop(
    session: &mut Session,
    local_site: SiteId,
    remote_site: Option<SiteId>,
    practice_table: &str,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    loop {
        session.pump();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(session, local_site, remote_site, practice_table, line.trim()) {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("命令:");
    println!("  move <xyXY>   走子, 如 move 7242");
    println!("  msg <text>    桌内聊天");
    println!("  resign        认输");
    println!("  draw          求和");
    println!("  accept        接受和棋   decline  拒绝和棋");
    println!("  reset         重开对局");
    println!("  level <1-10>  调整 AI 难度");
    println!("  list          刷新远端桌子清单   tables  显示清单");
    println!("  join <tid>    加入远端桌子       new     开新远端桌");
    println!("  quit          退出");
}

/// 处理一行命令；返回 false 表示退出
fn handle_command(
    session: &mut Session,
    local_site: SiteId,
    remote_site: Option<SiteId>,
    practice_table: &str,
    command: &str,
) -> bool {
    let (verb, arg) = match command.split_once(' ') {
        Some((v, a)) => (v, a.trim()),
        None => (command, ""),
    };

    let result = match verb {
        "" => Ok(()),
        "quit" | "exit" => return false,
        "help" => {
            print_help();
            Ok(())
        }
        "move" => {
            let color = session
                .manager()
                .site(local_site)
                .and_then(|s| s.table(practice_table))
                .and_then(|t| t.board_player().map(|p| p.id.clone()))
                .and_then(|pid| {
                    session
                        .manager()
                        .site(local_site)
                        .and_then(|s| s.table(practice_table))
                        .and_then(|t| t.player_role(&pid))
                })
                .unwrap_or(Color::Red);
            match parse_move(arg, color) {
                Some(mv) => with_site(session, local_site, |s| {
                    s.on_board_move(practice_table, &mv)
                }),
                None => {
                    println!("走法须是四位数字, 如 7242");
                    Ok(())
                }
            }
        }
        "msg" => with_site(session, local_site, |s| {
            s.on_board_message(practice_table, arg)
        }),
        "resign" => with_site(session, local_site, |s| s.on_board_resign(practice_table)),
        "draw" => with_site(session, local_site, |s| s.on_board_draw(practice_table)),
        "accept" => with_site(session, local_site, |s| {
            s.on_board_draw_response(practice_table, true)
        }),
        "decline" => with_site(session, local_site, |s| {
            s.on_board_draw_response(practice_table, false)
        }),
        "reset" => with_site(session, local_site, |s| s.on_board_reset(practice_table)),
        "level" => match arg.parse::<u8>() {
            Ok(level) => with_site(session, local_site, |s| {
                s.on_board_ai_level(practice_table, level)
            }),
            Err(_) => {
                println!("难度须是 1-10 的整数");
                Ok(())
            }
        },
        "list" => match remote_site {
            Some(site_id) => with_site(session, site_id, |s| s.query_tables()),
            None => {
                println!("没有配置远程站点");
                Ok(())
            }
        },
        "tables" => {
            if let Some(site) = remote_site.and_then(|id| session.manager().site(id)) {
                for info in site.listing() {
                    println!(
                        "  {}  {}  红:{}({})  黑:{}({})",
                        info.id,
                        info.initial_time,
                        info.red_id.as_deref().unwrap_or("-"),
                        info.red_score,
                        info.black_id.as_deref().unwrap_or("-"),
                        info.black_score,
                    );
                }
            } else {
                println!("没有配置远程站点");
            }
            Ok(())
        }
        "join" => match remote_site {
            Some(site_id) => with_site(session, site_id, |s| s.on_local_request_join(arg)),
            None => {
                println!("没有配置远程站点");
                Ok(())
            }
        },
        "new" => match remote_site {
            Some(site_id) => with_site(session, site_id, |s| {
                s.on_local_request_new(TimeInfo::new(
                    PRACTICE_GAME_SECS,
                    PRACTICE_MOVE_SECS,
                    PRACTICE_FREE_SECS,
                ))
            }),
            None => {
                println!("没有配置远程站点");
                Ok(())
            }
        },
        other => {
            println!("未知命令: {other}，输入 help 查看用法");
            Ok(())
        }
    };

    if let Err(err) = result {
        warn!(%err, "命令执行失败");
    }
    true
}

fn with_site<F>(session: &mut Session, site_id: SiteId, f: F) -> chess_session::Result<()>
where
    F: FnOnce(&mut chess_session::Site) -> chess_session::Result<()>,
{
    match session.manager_mut().site_mut(site_id) {
        Some(site) => f(site),
        None => {
            println!("站点已关闭");
            Ok(())
        }
    }
}

/// 把四位数字记法解析成走法
///
/// 控制台不跟踪盘面，棋子身份交由裁判侧裁决，这里只携带坐标。
fn parse_move(notation: &str, color: Color) -> Option<Move> {
    let digits: Vec<u8> = notation
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<_>>>()?;
    let [fx, fy, tx, ty] = digits[..] else {
        return None;
    };
    if fx > 8 || tx > 8 || fy > 9 || ty > 9 {
        return None;
    }
    Some(Move {
        piece: Piece {
            kind: PieceKind::Soldier,
            color,
        },
        from: Position::new(fx, fy),
        to: Position::new(tx, ty),
        captured: None,
    })
}
