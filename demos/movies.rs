use serde::{Deserialize, Serialize};
use slintschema::*;

#[derive(Debug, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct Movie {
    pub title: String,
    pub director: String,
    pub producer: String,
    pub releaseDate: String,
    pub movieId: i64,
}

#[tokio::main]
async fn main() -> slintschema::Result<()> {
    let config = EngineConfig::from_env()?;
    let db = Database::connect(config).await?;

    table!(db.registry(), Movie {
        title: TEXT,
        director: TEXT,
        producer: TEXT,
        releaseDate: DATE,
        movieId: INTEGER | PRIMARY_KEY,
    })?;
    table!(db.registry(), Screening {
        screeningId: INTEGER | PRIMARY_KEY,
        movieId: INTEGER | FOREIGN_KEY => Movie.movieId,
        shownOn: DATE,
    })?;

    // Rejected up front, before anything reaches the engine.
    if let Err(err) = table!(db.registry(), Broken {
        a: INTEGER | PRIMARY_KEY,
        b: INTEGER | PRIMARY_KEY,
        c: TEXT | FOREIGN_KEY => Nowhere.id,
    }) {
        println!("{err}");
    }

    db.migrate().await?;

    let movies = db.table("Movie").expect("Movie was just declared");
    print!("{}", movies.schema());
    println!("{}", movies.render_create_statement());

    let alien = Movie {
        title: "Alien".into(),
        director: "Ridley Scott".into(),
        producer: "Walter Hill".into(),
        releaseDate: "1979-05-25".into(),
        movieId: 1,
    };
    movies.insert(&alien).await?;

    let all: Vec<Movie> = movies.select().order_by("title", "ASC").fetch_all().await?;
    println!("All movies: {:?}", all);

    db.raw("DELETE FROM Movie WHERE movieId = 1").await?;
    Ok(())
}
