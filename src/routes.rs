use crate::{
    api::{attendance, reconcile, student},
    auth::middleware::auth_middleware,
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

// Helper to build the per-peer limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // extractor failures use the same envelope as handler errors
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance?date= | ?studentId=
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::mark_attendance)),
                    )
                    // /attendance/students?date=
                    .service(
                        web::resource("/students")
                            .route(web::get().to(attendance::attendance_students)),
                    )
                    // /attendance/summary?date=
                    .service(
                        web::resource("/summary")
                            .route(web::get().to(attendance::attendance_summary)),
                    )
                    // /attendance/reconcile
                    .service(
                        web::resource("/reconcile")
                            .route(web::post().to(reconcile::reconcile_attendance)),
                    ),
            )
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::post().to(student::create_student))
                            .route(web::get().to(student::list_students)),
                    )
                    // /students/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student::get_student))
                            .route(web::put().to(student::update_student)),
                    ),
            ),
    );
}

// API REQUEST
//  └─ Authorization: Bearer <token from identity provider>
//       └─ claims { sub, role: admin | staff, centerId }
